// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! LLM provider trait and related types
//!
//! Defines the abstraction layer for model backends. Scribe does not
//! standardize a wire protocol; a backend only has to produce completions
//! and event streams in the shapes below.

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

use crate::chat::ChatMessage;
use crate::error::Result;

/// A lazily produced, finite stream of generation events. Not restartable;
/// a new model call must be issued to regenerate.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>;

/// Main trait for model backends
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name (e.g. "anthropic", "mock")
    fn name(&self) -> &str;

    /// Non-streaming completion
    async fn complete(&self, request: GenerationRequest) -> Result<Completion>;

    /// Streaming completion
    async fn complete_stream(&self, request: GenerationRequest) -> Result<EventStream>;
}

/// Request handed to a provider for one model invocation
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    /// Model to use (provider default when absent)
    pub model: Option<String>,

    /// Messages in the conversation
    pub messages: Vec<ChatMessage>,

    /// Sampling temperature
    pub temperature: Option<f64>,

    /// Tools available for the model to use
    pub tools: Vec<ToolSpec>,

    /// How the model should choose tools
    pub tool_choice: Option<String>,

    /// Requested response format (e.g. a JSON-object constraint)
    pub response_format: Option<serde_json::Value>,

    /// Provider-specific options passed through opaquely
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl GenerationRequest {
    /// Create a request over a message list.
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the temperature.
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the tools.
    pub fn with_tools(mut self, tools: Vec<ToolSpec>) -> Self {
        self.tools = tools;
        self
    }

    /// Constrain the response to a JSON object.
    pub fn with_json_response(mut self) -> Self {
        self.response_format = Some(serde_json::json!({ "type": "json_object" }));
        self
    }
}

/// The name/description/schema triple advertised to the model for one tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Tool name
    pub name: String,

    /// Tool description
    pub description: String,

    /// Input schema (JSON Schema object)
    pub input_schema: serde_json::Value,
}

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Call identifier, echoed back in the tool's response message
    pub id: String,

    /// Tool name
    pub name: String,

    /// Call arguments
    pub arguments: serde_json::Value,
}

impl ToolCall {
    /// Create a call with a fresh id.
    pub fn new(name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            arguments,
        }
    }
}

/// Result of a non-streaming completion
#[derive(Debug, Clone, Default)]
pub struct Completion {
    /// Generated text
    pub text: String,

    /// Tool invocations the model requested, if any
    pub tool_calls: Vec<ToolCall>,
}

/// Events from a streaming response
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// A fragment of generated text
    TextDelta { text: String },

    /// A fragment of model reasoning; surfaced as progress, never written
    /// into the buffer
    ReasoningDelta { text: String },

    /// A complete tool invocation request
    ToolCall(ToolCall),

    /// Provider-side error
    Error { message: String },
}
