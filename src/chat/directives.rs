// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Directive-block extraction
//!
//! Free-form document text may embed fenced code blocks that configure the
//! request instead of being shown to the model:
//!
//! - ```` ```json copilot-options ```` / ```` ```yaml copilot-options ````
//! - ```` ```json copilot-tools ````
//! - ```` ```ts copilot-tool-definition ```` (tool documents)
//! - ```` ```json copilot-tool-parameters ```` / yaml variant
//!
//! The scanner strips recognized directive blocks out of the text and
//! returns them separately; all other fenced blocks pass through verbatim.

use serde_json::Value;

use crate::error::Result;

/// What a directive block configures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveKind {
    /// Options object merged into the accumulated [`super::CopilotOptions`]
    Options,
    /// Array of tool-reference strings
    Tools,
    /// A tool document's signature block
    ToolDefinition,
    /// A tool document's default-parameters block
    ToolParameters,
}

/// One extracted directive block
#[derive(Debug, Clone)]
pub struct DirectiveBlock {
    pub kind: DirectiveKind,
    /// Fence language (`json`, `yaml`, `ts`, ...)
    pub language: String,
    /// Block body without the fences
    pub body: String,
}

impl DirectiveBlock {
    /// Parse the body as structured data according to the fence language.
    pub fn parse(&self) -> Result<Value> {
        match self.language.as_str() {
            "yaml" | "yml" => Ok(serde_yaml::from_str(&self.body)?),
            _ => Ok(serde_json::from_str(&self.body)?),
        }
    }
}

fn classify(language: &str, tag: &str) -> Option<DirectiveKind> {
    match (language, tag) {
        ("json" | "yaml" | "yml", "copilot-options") => Some(DirectiveKind::Options),
        ("json", "copilot-tools") => Some(DirectiveKind::Tools),
        ("ts" | "typescript", "copilot-tool-definition") => Some(DirectiveKind::ToolDefinition),
        ("json" | "yaml" | "yml", "copilot-tool-parameters") => Some(DirectiveKind::ToolParameters),
        _ => None,
    }
}

/// Scan `text` for directive blocks. Returns the text with directive blocks
/// removed, plus the blocks in document order.
pub fn extract_directives(text: &str) -> (String, Vec<DirectiveBlock>) {
    let mut remaining: Vec<&str> = Vec::new();
    let mut blocks = Vec::new();

    let mut lines = text.lines().peekable();
    while let Some(line) = lines.next() {
        let trimmed = line.trim_start();
        if let Some(info) = trimmed.strip_prefix("```") {
            let mut words = info.split_whitespace();
            let language = words.next().unwrap_or("");
            let tag = words.next().unwrap_or("");

            if let Some(kind) = classify(language, tag) {
                let mut body_lines = Vec::new();
                for body_line in lines.by_ref() {
                    if body_line.trim_start().starts_with("```") {
                        break;
                    }
                    body_lines.push(body_line);
                }
                blocks.push(DirectiveBlock {
                    kind,
                    language: language.to_string(),
                    body: body_lines.join("\n"),
                });
                continue;
            }

            // An ordinary fenced block; pass it through untouched.
            remaining.push(line);
            for body_line in lines.by_ref() {
                remaining.push(body_line);
                if body_line.trim_start().starts_with("```") {
                    break;
                }
            }
            continue;
        }
        remaining.push(line);
    }

    (remaining.join("\n"), blocks)
}
