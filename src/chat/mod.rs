// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Conversation types and the request/session pipeline
//!
//! - [`ChatMessage`]/[`Role`]: ordered, role-tagged conversation messages
//! - [`options`]: merge-accumulated generation options
//! - [`directives`]: fenced directive-block extraction
//! - [`builder`]: assembles an immutable [`builder::ChatRequest`]
//! - [`session`]: drives one model invocation and the tool loop
//! - [`consumer`]: line-buffered flushing of stream events through a cursor

pub mod builder;
pub mod consumer;
pub mod directives;
pub mod options;
pub mod session;

pub use builder::{ChatRequest, ChatRequestBuilder};
pub use consumer::{ProgressSink, StreamConsumer};
pub use options::CopilotOptions;
pub use session::ChatSession;

use serde::{Deserialize, Serialize};

use crate::llm::provider::ToolCall;

/// Role of a message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System prompt
    System,
    /// User message
    User,
    /// Assistant response
    Assistant,
    /// Tool result, answering one assistant tool call
    Tool,
}

/// A message in a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the sender
    pub role: Role,

    /// Message content
    pub content: MessageContent,

    /// Tool invocations carried by an assistant message. Each must be
    /// answered by a following Tool-role message.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    /// The call a Tool-role message answers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

/// Content of a message
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Plain text
    Text(String),
    /// Structured parts (text plus media attachments)
    Parts(Vec<ContentPart>),
}

/// One structured content part
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// Text content
    Text { text: String },

    /// Image attachment
    Image {
        media_type: String,
        source: MediaSource,
    },

    /// Audio attachment
    Audio {
        media_type: String,
        source: MediaSource,
    },
}

/// Where a media attachment's bytes come from
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MediaSource {
    /// Base64-encoded data read from a local file
    Base64 { data: String },
    /// A remote URL, fetched by the provider
    Url { url: String },
}

impl ChatMessage {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::text(Role::System, content)
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::text(Role::User, content)
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::text(Role::Assistant, content)
    }

    /// Create an assistant message carrying pending tool calls.
    pub fn assistant_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            ..Self::text(Role::Assistant, content)
        }
    }

    /// Create a Tool-role message answering `tool_call_id`.
    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            ..Self::text(Role::Tool, content)
        }
    }

    /// Create a message with structured content parts.
    pub fn parts(role: Role, parts: Vec<ContentPart>) -> Self {
        Self {
            role,
            content: MessageContent::Parts(parts),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    fn text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: MessageContent::Text(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// The message's text content; structured parts are joined.
    pub fn text_content(&self) -> String {
        match &self.content {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join(""),
        }
    }

    /// Append a line to a plain-text message.
    pub(crate) fn push_line(&mut self, line: &str) {
        if let MessageContent::Text(text) = &mut self.content {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(line);
        }
    }
}
