// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Tool-document parsing
//!
//! A tool document is a text document containing exactly one fenced
//! `ts`/`typescript` block tagged `copilot-tool-definition`, holding either
//! a JSDoc comment or a function signature. An optional
//! `copilot-tool-parameters` block supplies default arguments and is
//! stripped before the remaining document body becomes the tool's own
//! system content.

use regex::Regex;
use serde_json::Value;
use std::path::Path;
use std::sync::OnceLock;

use crate::chat::directives::{extract_directives, DirectiveKind};
use crate::error::{Result, ScribeError};
use crate::tools::definition::SchemaBuilder;

/// The parsed surface of a tool document.
#[derive(Debug, Clone)]
pub struct ParsedToolDocument {
    /// Tool name, from the function signature or derived from the path
    pub name: String,
    /// Description, from the JSDoc comment when present
    pub description: String,
    /// Input schema built from the declared parameters
    pub input_schema: Value,
    /// Defaults from the `copilot-tool-parameters` block
    pub default_parameters: Option<Value>,
    /// Document body with both directive blocks stripped; used as the
    /// tool's system content when it executes
    pub system_content: String,
}

#[derive(Debug)]
struct ParamDecl {
    name: String,
    type_name: String,
    description: String,
    required: bool,
}

fn function_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"function\s*([A-Za-z_$][\w$]*)?\s*\(([^)]*)\)").expect("valid regex")
    })
}

fn jsdoc_param_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"@param\s*(?:\{([^}]*)\})?\s*(\[)?([\w$]+)(?:\s*=\s*[^\]\s]+)?\]?\s*-?\s*(.*)")
            .expect("valid regex")
    })
}

/// Parse a tool document fetched from `source`.
///
/// Fails when the document has no `copilot-tool-definition` block.
pub fn parse_tool_document(source: &Path, content: &str) -> Result<ParsedToolDocument> {
    let (system_content, blocks) = extract_directives(content);

    let definition = blocks
        .iter()
        .find(|b| b.kind == DirectiveKind::ToolDefinition)
        .ok_or_else(|| {
            ScribeError::ToolResolution(format!(
                "{} has no copilot-tool-definition block",
                source.display()
            ))
        })?;

    let default_parameters = blocks
        .iter()
        .find(|b| b.kind == DirectiveKind::ToolParameters)
        .map(|b| b.parse())
        .transpose()
        .map_err(|e| {
            ScribeError::ToolResolution(format!(
                "{}: malformed copilot-tool-parameters block: {}",
                source.display(),
                e
            ))
        })?;

    let (name, description, params) = parse_definition_block(&definition.body);

    let name = name.unwrap_or_else(|| derive_name(source));
    let description = if description.is_empty() {
        format!("Tool defined in {}", file_name(source))
    } else {
        description
    };

    let mut schema = SchemaBuilder::new();
    for param in &params {
        schema = match param.type_name.as_str() {
            "number" | "integer" => schema.integer(&param.name, &param.description, param.required),
            t if t.ends_with("[]") || t.starts_with("Array<") => {
                schema.array(&param.name, &param.description, "string", param.required)
            }
            "boolean" => schema.boolean(&param.name, &param.description, param.required),
            _ => schema.string(&param.name, &param.description, param.required),
        };
    }

    Ok(ParsedToolDocument {
        name,
        description,
        input_schema: schema.build(),
        default_parameters,
        system_content: system_content.trim().to_string(),
    })
}

/// Parse the definition block body: a JSDoc comment, a function signature,
/// or both.
fn parse_definition_block(body: &str) -> (Option<String>, String, Vec<ParamDecl>) {
    let mut description_lines = Vec::new();
    let mut params: Vec<ParamDecl> = Vec::new();

    if let Some(open) = body.find("/**") {
        let comment = match body[open..].find("*/") {
            Some(close) => &body[open + 3..open + close],
            None => &body[open + 3..],
        };
        for raw_line in comment.lines() {
            let line = raw_line.trim().trim_start_matches('*').trim();
            if line.is_empty() {
                continue;
            }
            if line.starts_with('@') {
                if let Some(caps) = jsdoc_param_regex().captures(line) {
                    let type_name = caps.get(1).map_or("string", |m| m.as_str()).to_string();
                    let optional = caps.get(2).is_some();
                    params.push(ParamDecl {
                        name: caps[3].to_string(),
                        type_name,
                        description: caps.get(4).map_or("", |m| m.as_str()).to_string(),
                        required: !optional,
                    });
                }
            } else {
                description_lines.push(line.to_string());
            }
        }
    }

    let mut name = None;
    if let Some(caps) = function_regex().captures(body) {
        name = caps.get(1).map(|m| m.as_str().to_string());
        // Signature parameters fill in anything JSDoc did not declare.
        if params.is_empty() {
            params = parse_signature_params(caps.get(2).map_or("", |m| m.as_str()));
        }
    }

    (name, description_lines.join(" "), params)
}

fn parse_signature_params(list: &str) -> Vec<ParamDecl> {
    list.split(',')
        .filter_map(|raw| {
            let raw = raw.trim();
            if raw.is_empty() {
                return None;
            }
            let (decl, default) = match raw.split_once('=') {
                Some((d, def)) => (d.trim(), Some(def.trim())),
                None => (raw, None),
            };
            let (name, type_name) = match decl.split_once(':') {
                Some((n, t)) => (n.trim(), t.trim()),
                None => (decl, "string"),
            };
            let name = name.trim_end_matches('?');
            let optional = default.is_some() || decl.contains('?');
            Some(ParamDecl {
                name: name.to_string(),
                type_name: type_name.to_string(),
                description: match default {
                    Some(def) => format!("default: {}", def),
                    None => String::new(),
                },
                required: !optional,
            })
        })
        .collect()
}

/// Derive a deterministic tool name from the document path.
fn derive_name(source: &Path) -> String {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "tool".to_string());
    let sanitized: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    format!("doc_{}", sanitized)
}

fn file_name(source: &Path) -> String {
    source
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| source.display().to_string())
}
