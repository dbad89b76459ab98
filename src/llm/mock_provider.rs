// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Scripted in-process provider for tests
//!
//! Responses are queued ahead of time and played back in order; every
//! request is recorded for later assertions. Both completion modes draw
//! from the same queue: a scripted completion streams as one text delta
//! per line, scripted events collapse to a completion by concatenating
//! their text deltas.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::error::{Result, ScribeError};
use crate::llm::provider::{
    Completion, EventStream, GenerationRequest, LlmProvider, StreamEvent,
};

enum Scripted {
    Completion(Completion),
    Events(Vec<Result<StreamEvent>>),
}

/// A provider that plays back scripted responses.
#[derive(Default)]
pub struct MockProvider {
    scripted: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a plain-text completion.
    pub fn push_text(&self, text: impl Into<String>) {
        self.scripted
            .lock()
            .unwrap()
            .push_back(Scripted::Completion(Completion {
                text: text.into(),
                tool_calls: Vec::new(),
            }));
    }

    /// Queue a completion that requests tool calls.
    pub fn push_completion(&self, completion: Completion) {
        self.scripted
            .lock()
            .unwrap()
            .push_back(Scripted::Completion(completion));
    }

    /// Queue an exact event sequence for a streaming response.
    pub fn push_events(&self, events: Vec<Result<StreamEvent>>) {
        self.scripted
            .lock()
            .unwrap()
            .push_back(Scripted::Events(events));
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of scripted responses not yet consumed.
    pub fn remaining(&self) -> usize {
        self.scripted.lock().unwrap().len()
    }

    fn next_scripted(&self, request: GenerationRequest) -> Result<Scripted> {
        self.requests.lock().unwrap().push(request);
        self.scripted
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ScribeError::Provider("mock: no scripted response left".to_string()))
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: GenerationRequest) -> Result<Completion> {
        match self.next_scripted(request)? {
            Scripted::Completion(completion) => Ok(completion),
            Scripted::Events(events) => {
                let mut completion = Completion::default();
                for event in events {
                    match event? {
                        StreamEvent::TextDelta { text } => completion.text.push_str(&text),
                        StreamEvent::ToolCall(call) => completion.tool_calls.push(call),
                        StreamEvent::ReasoningDelta { .. } => {}
                        StreamEvent::Error { message } => {
                            return Err(ScribeError::Provider(message))
                        }
                    }
                }
                Ok(completion)
            }
        }
    }

    async fn complete_stream(&self, request: GenerationRequest) -> Result<EventStream> {
        let events = match self.next_scripted(request)? {
            Scripted::Events(events) => events,
            Scripted::Completion(completion) => {
                // One delta per line keeps line-buffered consumers honest.
                let mut events: Vec<Result<StreamEvent>> = Vec::new();
                let mut first = true;
                for line in completion.text.split('\n') {
                    let mut text = String::new();
                    if !first {
                        text.push('\n');
                    }
                    first = false;
                    text.push_str(line);
                    if !text.is_empty() {
                        events.push(Ok(StreamEvent::TextDelta { text }));
                    }
                }
                for call in completion.tool_calls {
                    events.push(Ok(StreamEvent::ToolCall(call)));
                }
                events
            }
        };
        Ok(Box::pin(futures::stream::iter(events)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::ChatMessage;
    use crate::llm::provider::ToolCall;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_playback_in_order() {
        let provider = MockProvider::new();
        provider.push_text("first");
        provider.push_text("second");

        let a = provider
            .complete(GenerationRequest::new(vec![ChatMessage::user("q1")]))
            .await
            .unwrap();
        let b = provider
            .complete(GenerationRequest::new(vec![ChatMessage::user("q2")]))
            .await
            .unwrap();
        assert_eq!(a.text, "first");
        assert_eq!(b.text, "second");
        assert_eq!(provider.remaining(), 0);
    }

    #[tokio::test]
    async fn test_requests_are_recorded() {
        let provider = MockProvider::new();
        provider.push_text("ok");
        provider
            .complete(GenerationRequest::new(vec![ChatMessage::user("hello")]))
            .await
            .unwrap();

        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].messages[0].text_content(), "hello");
    }

    #[tokio::test]
    async fn test_exhausted_queue_errors() {
        let provider = MockProvider::new();
        let err = provider
            .complete(GenerationRequest::new(vec![]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no scripted response"));
    }

    #[tokio::test]
    async fn test_completion_streams_per_line() {
        let provider = MockProvider::new();
        provider.push_text("line one\nline two");

        let mut stream = provider
            .complete_stream(GenerationRequest::new(vec![]))
            .await
            .unwrap();
        let mut text = String::new();
        let mut deltas = 0;
        while let Some(event) = stream.next().await {
            if let StreamEvent::TextDelta { text: delta } = event.unwrap() {
                text.push_str(&delta);
                deltas += 1;
            }
        }
        assert_eq!(text, "line one\nline two");
        assert_eq!(deltas, 2);
    }

    #[tokio::test]
    async fn test_scripted_events_collapse_to_completion() {
        let provider = MockProvider::new();
        let call = ToolCall::new("fs_read_file", serde_json::json!({"path": "a"}));
        provider.push_events(vec![
            Ok(StreamEvent::ReasoningDelta {
                text: "hmm".to_string(),
            }),
            Ok(StreamEvent::TextDelta {
                text: "answer".to_string(),
            }),
            Ok(StreamEvent::ToolCall(call.clone())),
        ]);

        let completion = provider
            .complete(GenerationRequest::new(vec![]))
            .await
            .unwrap();
        assert_eq!(completion.text, "answer");
        assert_eq!(completion.tool_calls, vec![call]);
    }
}
