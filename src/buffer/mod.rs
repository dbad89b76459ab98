// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Shared text buffer with tracked cursors
//!
//! [`TextBuffer`] is the plain line store. [`BufferHost`] owns one buffer
//! plus the explicit collection of live cursors, serializes every mutation
//! through an [`EditSerializer`], and notifies each registered cursor of
//! every change batch so tracked positions stay valid while generation and
//! human edits interleave.

pub mod cursor;
pub mod position;
pub mod serializer;

pub use cursor::Cursor;
pub use position::{BufferChange, Position};
pub use serializer::EditSerializer;

use std::sync::{Arc, Mutex};

use crate::error::{Result, ScribeError};

use cursor::CursorShared;

/// An in-memory text buffer addressed by (line, column) coordinates.
///
/// Lines are stored without separators; the buffer always contains at least
/// one (possibly empty) line. Columns are character offsets.
#[derive(Debug, Clone)]
pub struct TextBuffer {
    lines: Vec<String>,
}

impl TextBuffer {
    /// Create a buffer from initial text. `"a\n"` yields two lines, the
    /// second empty, matching editor semantics.
    pub fn from_text(text: &str) -> Self {
        Self {
            lines: text.split('\n').map(str::to_string).collect(),
        }
    }

    /// Create an empty buffer (one empty line).
    pub fn new() -> Self {
        Self::from_text("")
    }

    /// Full buffer content with `\n` separators.
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    /// Number of lines.
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Content of one line, without its separator.
    pub fn line_text(&self, line: usize) -> Result<&str> {
        self.lines
            .get(line)
            .map(String::as_str)
            .ok_or_else(|| ScribeError::Buffer(format!("line {} out of range", line)))
    }

    /// Position just past the last character of the buffer.
    pub fn end_position(&self) -> Position {
        let line = self.lines.len() - 1;
        Position::new(line, self.lines[line].chars().count())
    }

    /// Whether `position` denotes a valid location in the current content.
    pub fn contains(&self, position: Position) -> bool {
        self.lines
            .get(position.line)
            .is_some_and(|l| position.column <= l.chars().count())
    }

    fn validate(&self, change: &BufferChange) -> Result<()> {
        if change.range_start > change.range_end {
            return Err(ScribeError::Buffer(format!(
                "inverted range {}..{}",
                change.range_start, change.range_end
            )));
        }
        for position in [change.range_start, change.range_end] {
            if !self.contains(position) {
                return Err(ScribeError::Buffer(format!(
                    "position {} out of range",
                    position
                )));
            }
        }
        Ok(())
    }

    /// Apply one change. Positions must be valid in the current content.
    pub fn apply_change(&mut self, change: &BufferChange) -> Result<()> {
        self.validate(change)?;

        let start = change.range_start;
        let end = change.range_end;

        let prefix: String = self.lines[start.line].chars().take(start.column).collect();
        let suffix: String = self.lines[end.line].chars().skip(end.column).collect();

        let mut replacement: Vec<String> = format!("{}{}{}", prefix, change.text, suffix)
            .split('\n')
            .map(str::to_string)
            .collect();
        self.lines
            .splice(start.line..=end.line, replacement.drain(..));
        Ok(())
    }

    /// Apply a batch of simultaneous changes, all expressed against the
    /// pre-batch content. Applied in descending start order so earlier
    /// changes cannot shift the coordinates of later ones. All changes are
    /// validated up front; an invalid batch leaves the buffer untouched.
    pub fn apply_changes(&mut self, changes: &[BufferChange]) -> Result<()> {
        for change in changes {
            self.validate(change)?;
        }
        let mut ordered: Vec<&BufferChange> = changes.iter().collect();
        ordered.sort_by(|a, b| b.range_start.cmp(&a.range_start));
        for change in ordered {
            self.apply_change(change)?;
        }
        Ok(())
    }
}

impl Default for TextBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Owns one shared [`TextBuffer`] and the live cursors tracking into it.
///
/// This is the single serialization point for mutations: every edit goes
/// through [`BufferHost::apply_edit`], which applies the batch atomically
/// and then notifies every registered cursor. Reads are not locked against
/// mutation (context is snapshotted once at session start).
pub struct BufferHost {
    serializer: EditSerializer,
    state: Mutex<HostState>,
}

struct HostState {
    buffer: TextBuffer,
    cursors: Vec<Arc<CursorShared>>,
}

impl BufferHost {
    /// Create a host around initial text.
    pub fn new(text: &str) -> Arc<Self> {
        Arc::new(Self {
            serializer: EditSerializer::new(),
            state: Mutex::new(HostState {
                buffer: TextBuffer::from_text(text),
                cursors: Vec::new(),
            }),
        })
    }

    /// Snapshot of the full buffer content.
    pub fn text(&self) -> String {
        self.state.lock().unwrap().buffer.text()
    }

    /// Snapshot of one line's content.
    pub fn line_text(&self, line: usize) -> Result<String> {
        self.state
            .lock()
            .unwrap()
            .buffer
            .line_text(line)
            .map(str::to_string)
    }

    /// Number of lines.
    pub fn line_count(&self) -> usize {
        self.state.lock().unwrap().buffer.line_count()
    }

    /// Position just past the last character.
    pub fn end_position(&self) -> Position {
        self.state.lock().unwrap().buffer.end_position()
    }

    /// Create a cursor tracking `at`. The cursor stays registered until it
    /// is disposed.
    pub fn create_cursor(self: &Arc<Self>, at: Position) -> Result<Cursor> {
        let mut state = self.state.lock().unwrap();
        if !state.buffer.contains(at) {
            return Err(ScribeError::Buffer(format!("position {} out of range", at)));
        }
        let shared = Arc::new(CursorShared::new(at));
        state.cursors.push(shared.clone());
        tracing::trace!(position = %at, cursors = state.cursors.len(), "cursor created");
        Ok(Cursor::new(self.clone(), shared))
    }

    /// Number of live (registered) cursors.
    pub fn cursor_count(&self) -> usize {
        self.state.lock().unwrap().cursors.len()
    }

    /// Apply one change batch atomically, then notify every cursor.
    ///
    /// Edits queue FIFO behind the serializer regardless of which cursor or
    /// session issued them.
    pub async fn apply_edit(&self, changes: Vec<BufferChange>) -> Result<()> {
        self.serializer
            .apply(|| {
                let mut state = self.state.lock().unwrap();
                state.buffer.apply_changes(&changes)?;
                let cursors = state.cursors.clone();
                drop(state);
                for cursor in cursors {
                    cursor.on_buffer_changed(&changes);
                }
                Ok(())
            })
            .await
    }

    pub(crate) async fn apply_edit_then(
        &self,
        changes: Vec<BufferChange>,
        cursor: &Arc<CursorShared>,
        force_position: Position,
    ) -> Result<()> {
        self.serializer
            .apply(|| {
                let mut state = self.state.lock().unwrap();
                state.buffer.apply_changes(&changes)?;
                let cursors = state.cursors.clone();
                drop(state);
                for c in cursors {
                    c.on_buffer_changed(&changes);
                }
                cursor.set_position(force_position);
                Ok(())
            })
            .await
    }

    pub(crate) fn remove_cursor(&self, shared: &Arc<CursorShared>) {
        let mut state = self.state.lock().unwrap();
        state.cursors.retain(|c| !Arc::ptr_eq(c, shared));
        tracing::trace!(cursors = state.cursors.len(), "cursor disposed");
    }
}

impl std::fmt::Debug for BufferHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock().unwrap();
        f.debug_struct("BufferHost")
            .field("lines", &state.buffer.line_count())
            .field("cursors", &state.cursors.len())
            .finish()
    }
}
