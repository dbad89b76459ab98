// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Tool definition types
//!
//! A tool is a named, schema-described callable the model may invoke
//! mid-generation. The four kinds are modeled as one variant each, carrying
//! exactly the fields that kind needs; dispatch is by exhaustive match.

use serde_json::Value;
use std::path::PathBuf;

use crate::llm::provider::ToolSpec;

/// A registered tool, tagged by kind.
#[derive(Debug, Clone)]
pub enum ToolDefinition {
    /// Fixed local implementation, identified by name
    Builtin(BuiltinTool),

    /// Defined by a document; executed by running the document through a
    /// nested, non-streaming chat session
    Document(DocumentTool),

    /// Sourced from and proxied to the embedding environment
    Host(HostTool),

    /// Supplied by the model backend itself (e.g. native web search);
    /// opaque locally
    Provider(ProviderTool),
}

/// A builtin tool's advertised surface
#[derive(Debug, Clone)]
pub struct BuiltinTool {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// A document-defined tool
#[derive(Debug, Clone)]
pub struct DocumentTool {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    /// The defining document; fetched and re-parsed at execution time
    pub source: PathBuf,
}

/// A host-provided tool
#[derive(Debug, Clone)]
pub struct HostTool {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// A provider-native tool
#[derive(Debug, Clone)]
pub struct ProviderTool {
    pub name: String,
    /// Opaque provider configuration
    pub config: Value,
}

impl ToolDefinition {
    /// The tool's identity key.
    pub fn name(&self) -> &str {
        match self {
            ToolDefinition::Builtin(t) => &t.name,
            ToolDefinition::Document(t) => &t.name,
            ToolDefinition::Host(t) => &t.name,
            ToolDefinition::Provider(t) => &t.name,
        }
    }

    /// The name/description/schema triple advertised to the model, when the
    /// tool has one locally. Provider-native tools are opaque and bound by
    /// the backend instead.
    pub fn spec(&self) -> Option<ToolSpec> {
        match self {
            ToolDefinition::Builtin(t) => Some(ToolSpec {
                name: t.name.clone(),
                description: t.description.clone(),
                input_schema: t.input_schema.clone(),
            }),
            ToolDefinition::Document(t) => Some(ToolSpec {
                name: t.name.clone(),
                description: t.description.clone(),
                input_schema: t.input_schema.clone(),
            }),
            ToolDefinition::Host(t) => Some(ToolSpec {
                name: t.name.clone(),
                description: t.description.clone(),
                input_schema: t.input_schema.clone(),
            }),
            ToolDefinition::Provider(_) => None,
        }
    }
}

/// Helper to build a tool input schema
pub struct SchemaBuilder {
    properties: serde_json::Map<String, Value>,
    required: Vec<String>,
}

impl SchemaBuilder {
    /// Create a new schema builder
    pub fn new() -> Self {
        Self {
            properties: serde_json::Map::new(),
            required: vec![],
        }
    }

    /// Add a string property
    pub fn string(mut self, name: &str, description: &str, required: bool) -> Self {
        self.properties.insert(
            name.to_string(),
            serde_json::json!({
                "type": "string",
                "description": description
            }),
        );
        if required {
            self.required.push(name.to_string());
        }
        self
    }

    /// Add an integer property
    pub fn integer(mut self, name: &str, description: &str, required: bool) -> Self {
        self.properties.insert(
            name.to_string(),
            serde_json::json!({
                "type": "integer",
                "description": description
            }),
        );
        if required {
            self.required.push(name.to_string());
        }
        self
    }

    /// Add an array property
    pub fn array(mut self, name: &str, description: &str, item_type: &str, required: bool) -> Self {
        self.properties.insert(
            name.to_string(),
            serde_json::json!({
                "type": "array",
                "description": description,
                "items": {
                    "type": item_type
                }
            }),
        );
        if required {
            self.required.push(name.to_string());
        }
        self
    }

    /// Add a boolean property
    pub fn boolean(mut self, name: &str, description: &str, required: bool) -> Self {
        self.properties.insert(
            name.to_string(),
            serde_json::json!({
                "type": "boolean",
                "description": description
            }),
        );
        if required {
            self.required.push(name.to_string());
        }
        self
    }

    /// Build the schema
    pub fn build(self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": Value::Object(self.properties),
            "required": self.required,
        })
    }
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}
