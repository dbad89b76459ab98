// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Session driver
//!
//! [`ChatSession`] owns one conversation turn against a provider: it issues
//! the model call, executes any tool calls the model requests, folds the
//! results back into the conversation, and repeats until the model answers
//! without tools. Tool failures are not fatal; the error text goes back to
//! the model as the tool result so it can recover or explain. Cancellation
//! is checked between every pull and propagates to nested tool work through
//! child tokens.

use futures::StreamExt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::chat::builder::ChatRequest;
use crate::chat::ChatMessage;
use crate::error::{Result, ScribeError};
use crate::llm::provider::{
    EventStream, GenerationRequest, LlmProvider, StreamEvent, ToolCall,
};
use crate::tools::{ToolProvider, ToolSet};

/// Drives model invocations and the tool loop for one conversation turn.
pub struct ChatSession {
    llm: Arc<dyn LlmProvider>,
    cancel: CancellationToken,
}

impl ChatSession {
    /// Create a session with a fresh cancellation token.
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self::with_cancel(llm, CancellationToken::new())
    }

    /// Create a session tied to an existing token, e.g. a child of an outer
    /// session's token for nested tool work.
    pub fn with_cancel(llm: Arc<dyn LlmProvider>, cancel: CancellationToken) -> Self {
        Self { llm, cancel }
    }

    /// The session's cancellation token. Cancelling it stops the model
    /// call, in-flight tool executions, and any nested sessions.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Run the turn in batch mode and return the final answer text.
    pub async fn complete(&self, tools: &ToolProvider, request: &ChatRequest) -> Result<String> {
        self.run_batch(tools, request, false).await
    }

    /// Run the turn in batch mode with the response constrained to a JSON
    /// object.
    pub async fn complete_json(
        &self,
        tools: &ToolProvider,
        request: &ChatRequest,
    ) -> Result<String> {
        self.run_batch(tools, request, true).await
    }

    async fn run_batch(
        &self,
        tools: &ToolProvider,
        request: &ChatRequest,
        force_json: bool,
    ) -> Result<String> {
        let tool_set = tools.new_tool_set(&request.tool_context)?;
        let mut messages = request.messages.clone();

        loop {
            if self.cancel.is_cancelled() {
                return Err(ScribeError::Cancelled);
            }

            let mut generation = lower(request, &messages, &tool_set);
            if force_json {
                generation = generation.with_json_response();
            }

            let completion = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(ScribeError::Cancelled),
                completion = self.llm.complete(generation) => completion?,
            };

            if completion.tool_calls.is_empty() {
                return Ok(completion.text);
            }

            self.run_tool_round(tools, request, &mut messages, completion.text, completion.tool_calls)
                .await?;
        }
    }

    /// Run the turn in streaming mode. Text and reasoning deltas are
    /// forwarded; tool rounds happen between streams and are invisible to
    /// the consumer beyond the pause they cause.
    pub fn stream(&self, tools: Arc<ToolProvider>, request: ChatRequest) -> EventStream {
        let llm = self.llm.clone();
        let cancel = self.cancel.clone();

        Box::pin(async_stream::try_stream! {
            let tool_set = tools.new_tool_set(&request.tool_context)?;
            let mut messages = request.messages.clone();
            let session = ChatSession::with_cancel(llm.clone(), cancel.clone());

            loop {
                if cancel.is_cancelled() {
                    Err(ScribeError::Cancelled)?;
                }

                let generation = lower(&request, &messages, &tool_set);
                // `?` inside a select! arm is opaque to the surrounding
                // stream macro, so the Result is unwrapped a statement later.
                let events = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(ScribeError::Cancelled),
                    events = llm.complete_stream(generation) => events,
                };
                let mut events = events?;

                let mut text = String::new();
                let mut calls: Vec<ToolCall> = Vec::new();
                loop {
                    // Dropping the inner stream on cancellation aborts the
                    // underlying transport.
                    let next = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => Some(Err(ScribeError::Cancelled)),
                        next = events.next() => next,
                    };
                    let Some(event) = next else { break };
                    match event? {
                        StreamEvent::TextDelta { text: delta } => {
                            text.push_str(&delta);
                            yield StreamEvent::TextDelta { text: delta };
                        }
                        StreamEvent::ReasoningDelta { text: delta } => {
                            yield StreamEvent::ReasoningDelta { text: delta };
                        }
                        StreamEvent::ToolCall(call) => calls.push(call),
                        StreamEvent::Error { message } => {
                            Err(ScribeError::Provider(message))?;
                        }
                    }
                }

                if calls.is_empty() {
                    break;
                }
                session
                    .run_tool_round(&tools, &request, &mut messages, text, calls)
                    .await?;
            }
        })
    }

    /// Execute one round of tool calls and fold the results into the
    /// conversation.
    async fn run_tool_round(
        &self,
        tools: &ToolProvider,
        request: &ChatRequest,
        messages: &mut Vec<ChatMessage>,
        assistant_text: String,
        calls: Vec<ToolCall>,
    ) -> Result<()> {
        messages.push(ChatMessage::assistant_tool_calls(
            assistant_text,
            calls.clone(),
        ));

        for call in calls {
            let result = match request.tool_context.get(&call.name) {
                Some(definition) => {
                    tools
                        .execute_tool(
                            &request.tool_context,
                            definition,
                            &call.arguments,
                            &self.cancel,
                        )
                        .await
                }
                None => Err(ScribeError::ToolResolution(format!(
                    "tool is not registered: {}",
                    call.name
                ))),
            };

            let content = match result {
                Ok(output) => output,
                Err(error) if error.is_cancelled() => return Err(error),
                Err(error) => {
                    tracing::warn!(tool = %call.name, %error, "tool call failed");
                    format!("Error: {}", error)
                }
            };
            messages.push(ChatMessage::tool(call.id, content));
        }
        Ok(())
    }
}

fn lower(request: &ChatRequest, messages: &[ChatMessage], tool_set: &ToolSet) -> GenerationRequest {
    let mut generation = request.to_generation_request(tool_set);
    generation.messages = messages.to_vec();
    generation
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::builder::ChatRequestBuilder;
    use crate::llm::mock_provider::MockProvider;
    use crate::llm::provider::Completion;
    use crate::tools::ToolContext;

    async fn request_with_tools(
        tools: &ToolProvider,
        tokens: &[&str],
        user: &str,
    ) -> ChatRequest {
        let mut builder = ChatRequestBuilder::new(ToolContext::new(None)).with_user_message(user);
        for token in tokens {
            builder = builder.with_tool(*token);
        }
        builder.build(tools).await.unwrap()
    }

    #[tokio::test]
    async fn test_plain_completion() {
        let mock = Arc::new(MockProvider::new());
        mock.push_text("the answer");
        let tools = ToolProvider::new(mock.clone());
        let request = request_with_tools(&tools, &[], "question").await;

        let session = ChatSession::new(mock);
        let answer = session.complete(&tools, &request).await.unwrap();
        assert_eq!(answer, "the answer");
    }

    #[tokio::test]
    async fn test_tool_loop_executes_and_folds_results() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "line a\nline b").unwrap();

        let mock = Arc::new(MockProvider::new());
        mock.push_completion(Completion {
            text: String::new(),
            tool_calls: vec![ToolCall::new(
                "fs_read_file",
                serde_json::json!({"path": dir.path().join("notes.txt").to_string_lossy()}),
            )],
        });
        mock.push_text("summarized");

        let tools = ToolProvider::new(mock.clone());
        let request = request_with_tools(&tools, &["fs_read_file"], "summarize notes").await;

        let session = ChatSession::new(mock.clone());
        let answer = session.complete(&tools, &request).await.unwrap();
        assert_eq!(answer, "summarized");

        // Second request must carry the assistant tool call and its result.
        let requests = mock.requests();
        assert_eq!(requests.len(), 2);
        let second = &requests[1];
        assert!(!second.messages[1].tool_calls.is_empty());
        assert!(second.messages[2].text_content().contains("line a"));
    }

    #[tokio::test]
    async fn test_tool_failure_goes_back_as_error_text() {
        let mock = Arc::new(MockProvider::new());
        mock.push_completion(Completion {
            text: String::new(),
            tool_calls: vec![ToolCall::new(
                "fs_read_file",
                serde_json::json!({"path": "/no/such/file"}),
            )],
        });
        mock.push_text("could not read it");

        let tools = ToolProvider::new(mock.clone());
        let request = request_with_tools(&tools, &["fs_read_file"], "read it").await;

        let session = ChatSession::new(mock.clone());
        let answer = session.complete(&tools, &request).await.unwrap();
        assert_eq!(answer, "could not read it");

        let requests = mock.requests();
        let tool_result = requests[1].messages.last().unwrap();
        assert!(tool_result.text_content().starts_with("Error:"));
    }

    #[tokio::test]
    async fn test_unregistered_tool_call_goes_back_as_error_text() {
        let mock = Arc::new(MockProvider::new());
        mock.push_completion(Completion {
            text: String::new(),
            tool_calls: vec![ToolCall::new("made_up", serde_json::json!({}))],
        });
        mock.push_text("done");

        let tools = ToolProvider::new(mock.clone());
        let request = request_with_tools(&tools, &[], "go").await;

        let session = ChatSession::new(mock.clone());
        session.complete(&tools, &request).await.unwrap();

        let requests = mock.requests();
        assert!(requests[1]
            .messages
            .last()
            .unwrap()
            .text_content()
            .contains("not registered"));
    }

    #[tokio::test]
    async fn test_cancel_before_start() {
        let mock = Arc::new(MockProvider::new());
        mock.push_text("never seen");
        let tools = ToolProvider::new(mock.clone());
        let request = request_with_tools(&tools, &[], "q").await;

        let session = ChatSession::new(mock);
        session.cancel();
        session.cancel(); // idempotent

        let err = session.complete(&tools, &request).await.unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn test_stream_forwards_deltas() {
        let mock = Arc::new(MockProvider::new());
        mock.push_events(vec![
            Ok(StreamEvent::ReasoningDelta {
                text: "thinking".to_string(),
            }),
            Ok(StreamEvent::TextDelta {
                text: "hello ".to_string(),
            }),
            Ok(StreamEvent::TextDelta {
                text: "world".to_string(),
            }),
        ]);

        let tools = Arc::new(ToolProvider::new(mock.clone()));
        let request = request_with_tools(&tools, &[], "q").await;

        let session = ChatSession::new(mock);
        let mut stream = session.stream(tools, request);

        let mut text = String::new();
        let mut reasoning = String::new();
        while let Some(event) = stream.next().await {
            match event.unwrap() {
                StreamEvent::TextDelta { text: t } => text.push_str(&t),
                StreamEvent::ReasoningDelta { text: t } => reasoning.push_str(&t),
                other => panic!("unexpected event: {:?}", other),
            }
        }
        assert_eq!(text, "hello world");
        assert_eq!(reasoning, "thinking");
    }

    #[tokio::test]
    async fn test_stream_runs_tool_round_between_streams() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("f.txt"), "content").unwrap();

        let mock = Arc::new(MockProvider::new());
        mock.push_events(vec![Ok(StreamEvent::ToolCall(ToolCall::new(
            "fs_read_file",
            serde_json::json!({"path": dir.path().join("f.txt").to_string_lossy()}),
        )))]);
        mock.push_events(vec![Ok(StreamEvent::TextDelta {
            text: "read it".to_string(),
        })]);

        let tools = Arc::new(ToolProvider::new(mock.clone()));
        let request = request_with_tools(&tools, &["fs_read_file"], "read f").await;

        let session = ChatSession::new(mock.clone());
        let mut stream = session.stream(tools, request);

        let mut text = String::new();
        while let Some(event) = stream.next().await {
            if let StreamEvent::TextDelta { text: t } = event.unwrap() {
                text.push_str(&t);
            }
        }
        assert_eq!(text, "read it");
        assert_eq!(mock.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_stream_surfaces_provider_error_event() {
        let mock = Arc::new(MockProvider::new());
        mock.push_events(vec![
            Ok(StreamEvent::TextDelta {
                text: "partial".to_string(),
            }),
            Ok(StreamEvent::Error {
                message: "backend down".to_string(),
            }),
        ]);

        let tools = Arc::new(ToolProvider::new(mock.clone()));
        let request = request_with_tools(&tools, &[], "q").await;

        let session = ChatSession::new(mock);
        let mut stream = session.stream(tools, request);

        let first = stream.next().await.unwrap().unwrap();
        assert!(matches!(first, StreamEvent::TextDelta { .. }));
        let err = stream.next().await.unwrap().unwrap_err();
        assert!(err.to_string().contains("backend down"));
    }

    #[tokio::test]
    async fn test_stream_cancel_mid_flight() {
        let mock = Arc::new(MockProvider::new());
        mock.push_events(vec![
            Ok(StreamEvent::TextDelta {
                text: "first".to_string(),
            }),
            Ok(StreamEvent::TextDelta {
                text: "second".to_string(),
            }),
        ]);

        let tools = Arc::new(ToolProvider::new(mock.clone()));
        let request = request_with_tools(&tools, &[], "q").await;

        let session = ChatSession::new(mock);
        let cancel = session.cancel_token();
        let mut stream = session.stream(tools, request);

        let first = stream.next().await.unwrap().unwrap();
        assert!(matches!(first, StreamEvent::TextDelta { .. }));

        cancel.cancel();
        let err = stream.next().await.unwrap().unwrap_err();
        assert!(err.is_cancelled());
    }
}
