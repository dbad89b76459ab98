// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Request assembly
//!
//! [`ChatRequestBuilder`] turns free-form document text into an immutable
//! [`ChatRequest`]: role-marker lines split into messages, fenced directive
//! blocks configure options and tools, and media references split text
//! content into structured parts.
//!
//! Option blocks are self-healing rather than fatal: one malformed block
//! discards everything accumulated for the request and substitutes a single
//! corrective user message, so a typo in a document degrades the request
//! instead of failing it. Tool directives are different: a malformed tools
//! block or an unresolvable tool reference is a hard error, because a
//! request that silently drops a tool the document asked for would misbehave
//! in ways the user cannot see.

use serde_json::Value;
use std::sync::OnceLock;

use crate::chat::directives::{extract_directives, DirectiveBlock, DirectiveKind};
use crate::chat::options::CopilotOptions;
use crate::chat::{ChatMessage, ContentPart, MediaSource, MessageContent, Role};
use crate::error::{Result, ScribeError};
use crate::llm::provider::GenerationRequest;
use crate::tools::{ToolContext, ToolProvider, ToolSet};

/// An immutable, fully resolved request.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub options: CopilotOptions,
    pub tool_context: ToolContext,
}

impl ChatRequest {
    /// Lower this request into the provider-facing shape, advertising the
    /// given tool surface.
    pub fn to_generation_request(&self, tool_set: &ToolSet) -> GenerationRequest {
        let mut request = GenerationRequest::new(self.messages.clone());
        request.model = self.options.model.clone();
        request.temperature = self.options.temperature;
        request.tool_choice = self.options.tool_choice.clone();
        request.response_format = self.options.response_format.clone();
        request.extra = self.options.extra.clone();
        request.tools = tool_set.specs.clone();
        if !tool_set.provider_bindings.is_empty() {
            request.extra.insert(
                "provider_tools".to_string(),
                Value::Array(tool_set.provider_bindings.clone()),
            );
        }
        request
    }
}

/// Assembles a [`ChatRequest`] from document text, directives, and explicit
/// messages.
#[derive(Debug)]
pub struct ChatRequestBuilder {
    context: ToolContext,
    locale: String,
    system_prompt: Option<String>,
    messages: Vec<ChatMessage>,
    user_message: Option<String>,
    appended_user_message: Option<String>,
    options: CopilotOptions,
    options_invalid: bool,
    tool_tokens: Vec<String>,
    malformed_tools: Option<String>,
}

impl ChatRequestBuilder {
    /// Start a builder over a tool scope.
    pub fn new(context: ToolContext) -> Self {
        Self {
            context,
            locale: "en".to_string(),
            system_prompt: None,
            messages: Vec::new(),
            user_message: None,
            appended_user_message: None,
            options: CopilotOptions::default(),
            options_invalid: false,
            tool_tokens: Vec::new(),
            malformed_tools: None,
        }
    }

    /// Language the corrective message asks the model to respond in.
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    /// Set the system prompt. Directive blocks in it are honored.
    pub fn with_system_prompt(mut self, text: &str) -> Self {
        let rest = self.ingest_directives(text);
        let rest = rest.trim();
        if !rest.is_empty() {
            self.system_prompt = Some(rest.to_string());
        }
        self
    }

    /// Feed document lines into the conversation.
    ///
    /// A line starting with `**System:**`, `**User:**` or `**Copilot:**`
    /// opens a new message of that role; unmarked lines continue the current
    /// message (User when no marker has appeared yet). The `(Override)`
    /// marker variant drops every previously accumulated message of that
    /// role first.
    pub fn add_lines(mut self, text: &str) -> Self {
        let rest = self.ingest_directives(text);
        for line in rest.lines() {
            match role_marker(line) {
                Some((role, is_override, first)) => {
                    if is_override {
                        self.messages.retain(|m| m.role != role);
                        if role == Role::System {
                            self.system_prompt = None;
                        }
                    }
                    let mut message = ChatMessage::text_message(role, "");
                    if !first.is_empty() {
                        message.push_line(first);
                    }
                    self.messages.push(message);
                }
                None => match self.messages.last_mut() {
                    Some(current) => current.push_line(line),
                    None => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        self.messages.push(ChatMessage::user(line));
                    }
                },
            }
        }
        self
    }

    /// Set the primary user message. Directive blocks in it are honored.
    pub fn with_user_message(mut self, text: &str) -> Self {
        let rest = self.ingest_directives(text);
        self.user_message = Some(rest);
        self
    }

    /// Append text to the end of the final user message.
    pub fn with_appended_user_message(mut self, text: &str) -> Self {
        self.appended_user_message = Some(text.to_string());
        self
    }

    /// Merge an options object directly, with the same self-healing rule as
    /// a fenced block.
    pub fn with_options_value(mut self, value: Value) -> Self {
        self.apply_options(value);
        self
    }

    /// Request one tool by reference token.
    pub fn with_tool(mut self, token: impl Into<String>) -> Self {
        self.tool_tokens.push(token.into());
        self
    }

    /// Whether an options block failed to parse. Once set, everything
    /// accumulated for this request is discarded at build time.
    pub fn options_invalid(&self) -> bool {
        self.options_invalid
    }

    /// Resolve tools, split media, and assemble the final request.
    pub async fn build(mut self, provider: &ToolProvider) -> Result<ChatRequest> {
        if let Some(reason) = self.malformed_tools.take() {
            return Err(ScribeError::ToolResolution(format!(
                "malformed copilot-tools block: {reason}"
            )));
        }

        if self.options_invalid {
            // Discard everything accumulated for this request and hand the
            // model a single corrective message with default options.
            return Ok(ChatRequest {
                messages: vec![ChatMessage::user(corrective_message(&self.locale))],
                options: CopilotOptions::default(),
                tool_context: self.context,
            });
        }

        for token in std::mem::take(&mut self.tool_tokens) {
            provider.resolve_tool_text(&mut self.context, &token).await?;
        }

        let mut messages = Vec::new();
        if let Some(prompt) = &self.system_prompt {
            messages.push(ChatMessage::system(prompt.clone()));
        }
        messages.extend(self.messages.iter().cloned());

        let mut user_text = self.user_message.clone().unwrap_or_default();
        if let Some(appended) = &self.appended_user_message {
            if !user_text.is_empty() {
                user_text.push_str("\n\n");
            }
            user_text.push_str(appended);
        }
        if !user_text.trim().is_empty() {
            messages.push(ChatMessage::user(user_text));
        }

        for message in &mut messages {
            if message.role == Role::User {
                split_media_content(message, &self.context).await?;
            }
        }

        Ok(ChatRequest {
            messages,
            options: self.options.clone(),
            tool_context: self.context,
        })
    }

    /// Strip directive blocks out of `text`, applying them as they appear.
    fn ingest_directives(&mut self, text: &str) -> String {
        let (rest, blocks) = extract_directives(text);
        for block in blocks {
            self.ingest_block(block);
        }
        rest
    }

    /// Apply one extracted directive block.
    pub(crate) fn ingest_block(&mut self, block: DirectiveBlock) {
        match block.kind {
            DirectiveKind::Options => match block.parse() {
                Ok(value) => self.apply_options(value),
                Err(_) => self.invalidate_options(),
            },
            DirectiveKind::Tools => match block.parse() {
                Ok(Value::Array(tokens)) => {
                    for token in tokens {
                        match token {
                            Value::String(token) => self.tool_tokens.push(token),
                            other => self.flag_malformed_tools(format!(
                                "non-string tool reference: {other}"
                            )),
                        }
                    }
                }
                Ok(other) => self.flag_malformed_tools(format!(
                    "expected an array of tool references, got {other}"
                )),
                Err(error) => self.flag_malformed_tools(error.to_string()),
            },
            // Only meaningful inside tool documents.
            DirectiveKind::ToolDefinition | DirectiveKind::ToolParameters => {}
        }
    }

    fn apply_options(&mut self, value: Value) {
        if self.options_invalid {
            return;
        }
        if self.options.merge_value(value).is_err() {
            self.invalidate_options();
        }
    }

    fn invalidate_options(&mut self) {
        self.options = CopilotOptions::default();
        self.options_invalid = true;
        tracing::warn!("malformed options block; discarding accumulated request state");
    }

    /// A malformed tools block must not silently drop tools; record it and
    /// fail the build. The first reason wins.
    fn flag_malformed_tools(&mut self, reason: String) {
        if self.malformed_tools.is_none() {
            self.malformed_tools = Some(reason);
        }
    }
}

fn corrective_message(locale: &str) -> String {
    format!(
        "A `copilot-options` block in this document could not be parsed, so all \
         custom options were discarded and defaults are in effect. Briefly tell \
         the user this, in their language ({locale}), before answering."
    )
}

/// Parse a role-marker line. Returns the role, whether it overrides, and the
/// remainder of the line.
///
/// `(Override)` may sit inside the marker (`**System (Override):**`) or
/// right after it (`**System:** (Override)`).
fn role_marker(line: &str) -> Option<(Role, bool, &str)> {
    let trimmed = line.trim_start();
    for (marker, role) in [
        ("**System", Role::System),
        ("**User", Role::User),
        ("**Copilot", Role::Assistant),
    ] {
        if let Some(after) = trimmed.strip_prefix(marker) {
            let (mut is_override, after) = match after.strip_prefix(" (Override)") {
                Some(rest) => (true, rest),
                None => (false, after),
            };
            if let Some(rest) = after.strip_prefix(":**") {
                let mut rest = rest.trim_start();
                if let Some(stripped) = rest.strip_prefix("(Override)") {
                    is_override = true;
                    rest = stripped.trim_start();
                }
                return Some((role, is_override, rest));
            }
        }
    }
    None
}

impl ChatMessage {
    fn text_message(role: Role, content: &str) -> Self {
        match role {
            Role::System => ChatMessage::system(content),
            Role::User => ChatMessage::user(content),
            Role::Assistant => ChatMessage::assistant(content),
            Role::Tool => ChatMessage::tool("", content),
        }
    }
}

/// Media reference found in message text
struct MediaRef {
    start: usize,
    end: usize,
    source: String,
}

fn media_regexes() -> &'static [regex::Regex; 2] {
    static REGEXES: OnceLock<[regex::Regex; 2]> = OnceLock::new();
    REGEXES.get_or_init(|| {
        [
            regex::Regex::new(r"!\[[^\]]*\]\(([^)\s]+)\)").unwrap(),
            regex::Regex::new(r#"<img[^>]*\bsrc\s*=\s*"([^"]+)"[^>]*>"#).unwrap(),
        ]
    })
}

fn find_media_refs(text: &str) -> Vec<MediaRef> {
    let mut refs: Vec<MediaRef> = Vec::new();
    for regex in media_regexes() {
        for captures in regex.captures_iter(text) {
            let whole = captures.get(0).unwrap();
            refs.push(MediaRef {
                start: whole.start(),
                end: whole.end(),
                source: captures[1].to_string(),
            });
        }
    }
    refs.sort_by_key(|r| r.start);
    refs
}

/// MIME type for a media reference, from its extension.
fn media_type_of(source: &str) -> Result<(&'static str, bool)> {
    let extension = source
        .rsplit('.')
        .next()
        .unwrap_or("")
        .to_ascii_lowercase();
    // (media type, is_audio)
    let mapped = match extension.as_str() {
        "png" => ("image/png", false),
        "jpg" | "jpeg" => ("image/jpeg", false),
        "gif" => ("image/gif", false),
        "webp" => ("image/webp", false),
        "mp3" => ("audio/mpeg", true),
        "wav" => ("audio/wav", true),
        "ogg" => ("audio/ogg", true),
        "m4a" => ("audio/mp4", true),
        _ => {
            return Err(ScribeError::Media(format!(
                "unsupported media type: {}",
                source
            )))
        }
    };
    Ok(mapped)
}

/// Split a user message's text into structured parts wherever it references
/// media. Local files are inlined as base64; remote URLs pass through for
/// the provider to fetch.
async fn split_media_content(message: &mut ChatMessage, context: &ToolContext) -> Result<()> {
    let text = match &message.content {
        MessageContent::Text(text) => text.clone(),
        MessageContent::Parts(_) => return Ok(()),
    };
    let refs = find_media_refs(&text);
    if refs.is_empty() {
        return Ok(());
    }

    let mut parts = Vec::new();
    let mut cursor = 0;
    for media in refs {
        let before = &text[cursor..media.start];
        if !before.trim().is_empty() {
            parts.push(ContentPart::Text {
                text: before.to_string(),
            });
        }
        cursor = media.end;

        let (media_type, is_audio) = media_type_of(&media.source)?;
        let source = if media.source.starts_with("http://") || media.source.starts_with("https://")
        {
            MediaSource::Url {
                url: media.source.clone(),
            }
        } else {
            let path = context.resolve_path(&media.source);
            let bytes = tokio::fs::read(&path)
                .await
                .map_err(|e| ScribeError::Media(format!("{}: {}", path.display(), e)))?;
            use base64::Engine as _;
            MediaSource::Base64 {
                data: base64::engine::general_purpose::STANDARD.encode(bytes),
            }
        };

        parts.push(if is_audio {
            ContentPart::Audio {
                media_type: media_type.to_string(),
                source,
            }
        } else {
            ContentPart::Image {
                media_type: media_type.to_string(),
                source,
            }
        });
    }
    let after = &text[cursor..];
    if !after.trim().is_empty() {
        parts.push(ContentPart::Text {
            text: after.to_string(),
        });
    }

    message.content = MessageContent::Parts(parts);
    Ok(())
}
