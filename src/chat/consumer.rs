// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Stream consumption into a buffer
//!
//! [`StreamConsumer`] pulls generation events and writes text into the
//! buffer through a tracked [`Cursor`], flushing on line boundaries so a
//! watching user sees whole lines appear instead of flickering fragments.
//! Whatever remains when the stream ends is flushed once. Reasoning deltas
//! never touch the buffer; they feed a bounded progress preview.

use futures::StreamExt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::buffer::{Cursor, Position};
use crate::error::{Result, ScribeError};
use crate::llm::provider::{EventStream, StreamEvent};

/// Characters of reasoning kept in the progress preview.
const PREVIEW_CHARS: usize = 100;

/// Receives progress updates while a stream is being consumed.
pub trait ProgressSink: Send + Sync {
    /// Called with the current reasoning preview (at most the last
    /// [`PREVIEW_CHARS`] characters of reasoning seen so far).
    fn on_reasoning(&self, preview: &str);
}

/// Writes a generation stream into a buffer through a cursor.
pub struct StreamConsumer {
    cursor: Cursor,
    cancel: CancellationToken,
    progress: Option<Arc<dyn ProgressSink>>,
}

impl StreamConsumer {
    pub fn new(cursor: Cursor, cancel: CancellationToken) -> Self {
        Self {
            cursor,
            cancel,
            progress: None,
        }
    }

    /// Attach a progress sink for reasoning previews.
    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = Some(sink);
        self
    }

    /// The cursor this consumer writes through.
    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    /// Consume `events` to completion and return the cursor's final
    /// position.
    ///
    /// Cancellation is checked before every pull and before every flush; a
    /// cancelled consumer leaves already-flushed lines in the buffer and
    /// discards the rest. A stream error likewise discards the pending
    /// fragment and re-raises.
    pub async fn consume(&self, mut events: EventStream) -> Result<Position> {
        let mut pending = String::new();
        let mut reasoning = String::new();

        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(ScribeError::Cancelled),
                next = events.next() => next,
            };
            let Some(event) = next else { break };

            match event? {
                StreamEvent::TextDelta { text } => {
                    pending.push_str(&text);
                    self.flush_lines(&mut pending).await?;
                }
                StreamEvent::ReasoningDelta { text } => {
                    reasoning.push_str(&text);
                    trim_to_tail(&mut reasoning, PREVIEW_CHARS);
                    if let Some(sink) = &self.progress {
                        sink.on_reasoning(&reasoning);
                    }
                }
                StreamEvent::ToolCall(call) => {
                    // Tool rounds are the session's business; a call leaking
                    // through here means the stream was not session-driven.
                    tracing::debug!(tool = %call.name, "ignoring tool call in consumer");
                }
                StreamEvent::Error { message } => {
                    return Err(ScribeError::Provider(message));
                }
            }
        }

        // Terminal flush of the unterminated last line.
        if !pending.is_empty() {
            if self.cancel.is_cancelled() {
                return Err(ScribeError::Cancelled);
            }
            self.cursor.insert_text(&pending).await?;
        }
        Ok(self.cursor.position())
    }

    /// Flush every complete line in `pending` into the buffer.
    async fn flush_lines(&self, pending: &mut String) -> Result<()> {
        while let Some(newline) = pending.find('\n') {
            if self.cancel.is_cancelled() {
                return Err(ScribeError::Cancelled);
            }
            let line: String = pending.drain(..=newline).collect();
            self.cursor.insert_text(&line).await?;
        }
        Ok(())
    }
}

/// Truncate `text` in place to its last `max_chars` characters.
fn trim_to_tail(text: &mut String, max_chars: usize) {
    let count = text.chars().count();
    if count > max_chars {
        let cut = text
            .char_indices()
            .nth(count - max_chars)
            .map(|(i, _)| i)
            .unwrap_or(0);
        text.drain(..cut);
    }
}
