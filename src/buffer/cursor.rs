// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Tracked cursors
//!
//! A [`Cursor`] owns one position inside one buffer and keeps it valid as
//! arbitrary edits land, whether issued by its own session, another
//! session, or the human user typing elsewhere in the document. Insertions
//! and replacements go through the host's edit serializer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::buffer::position::{BufferChange, Position};
use crate::buffer::BufferHost;
use crate::error::{Result, ScribeError};

/// Cursor state shared with the buffer host's notification list.
pub(crate) struct CursorShared {
    position: Mutex<Position>,
    disposed: AtomicBool,
}

impl CursorShared {
    pub(crate) fn new(at: Position) -> Self {
        Self {
            position: Mutex::new(at),
            disposed: AtomicBool::new(false),
        }
    }

    pub(crate) fn position(&self) -> Position {
        *self.position.lock().unwrap()
    }

    pub(crate) fn set_position(&self, at: Position) {
        *self.position.lock().unwrap() = at;
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Re-derive the position from a notified change batch. Runs for every
    /// batch regardless of origin.
    pub(crate) fn on_buffer_changed(&self, changes: &[BufferChange]) {
        if self.is_disposed() {
            return;
        }
        let mut position = self.position.lock().unwrap();
        *position = position.transform_batch(changes);
    }
}

/// A tracked location in a [`BufferHost`] that survives concurrent edits.
///
/// Live from creation until [`Cursor::dispose`]; disposal detaches it from
/// change notifications and is idempotent. Dropping an undisposed cursor
/// disposes it.
pub struct Cursor {
    host: Arc<BufferHost>,
    shared: Arc<CursorShared>,
}

impl Cursor {
    pub(crate) fn new(host: Arc<BufferHost>, shared: Arc<CursorShared>) -> Self {
        Self { host, shared }
    }

    /// The cursor's current position.
    pub fn position(&self) -> Position {
        self.shared.position()
    }

    /// Whether this cursor has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.shared.is_disposed()
    }

    /// Insert text at the current position.
    ///
    /// Line separators are normalized to `\n` before the edit applies. The
    /// cursor's own change notification advances the position past the
    /// inserted text; the position after that notification is returned.
    pub async fn insert_text(&self, text: &str) -> Result<Position> {
        self.ensure_live()?;
        let normalized = normalize_line_separators(text);
        let at = self.position();
        self.host
            .apply_edit(vec![BufferChange::insert(at, normalized)])
            .await?;
        Ok(self.position())
    }

    /// Replace an entire line's content and move to the end of the new
    /// range.
    pub async fn replace_line_text(&self, text: &str, line: usize) -> Result<Position> {
        self.ensure_live()?;
        let normalized = normalize_line_separators(text);
        let line_len = self.host.line_text(line)?.chars().count();
        let change = BufferChange::replace(
            Position::new(line, 0),
            Position::new(line, line_len),
            normalized,
        );
        let landing = change.inserted_end();
        self.host
            .apply_edit_then(vec![change], &self.shared, landing)
            .await?;
        Ok(self.position())
    }

    /// Detach from change notifications. Safe to call more than once.
    pub fn dispose(&self) {
        if !self.shared.disposed.swap(true, Ordering::SeqCst) {
            self.host.remove_cursor(&self.shared);
        }
    }

    fn ensure_live(&self) -> Result<()> {
        if self.is_disposed() {
            return Err(ScribeError::Buffer("cursor is disposed".to_string()));
        }
        Ok(())
    }
}

impl Drop for Cursor {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cursor")
            .field("position", &self.position())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Normalize `\r\n` and bare `\r` to `\n`.
pub fn normalize_line_separators(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(line: usize, column: usize) -> Position {
        Position::new(line, column)
    }

    #[tokio::test]
    async fn test_insert_advances_cursor() {
        let host = BufferHost::new("Hello ");
        let cursor = host.create_cursor(pos(0, 6)).unwrap();

        let after = cursor.insert_text("world").await.unwrap();
        assert_eq!(host.text(), "Hello world");
        assert_eq!(after, pos(0, 11));
    }

    #[tokio::test]
    async fn test_insert_with_newline_moves_to_next_line() {
        let host = BufferHost::new("Hello ");
        let cursor = host.create_cursor(pos(0, 6)).unwrap();

        let after = cursor.insert_text("world!\n").await.unwrap();
        assert_eq!(host.text(), "Hello world!\n");
        assert_eq!(after, pos(1, 0));
    }

    #[tokio::test]
    async fn test_insert_normalizes_crlf() {
        let host = BufferHost::new("");
        let cursor = host.create_cursor(pos(0, 0)).unwrap();

        cursor.insert_text("a\r\nb\rc").await.unwrap();
        assert_eq!(host.text(), "a\nb\nc");
    }

    #[tokio::test]
    async fn test_cursor_survives_foreign_edit_before_it() {
        let host = BufferHost::new("Hello world");
        let cursor = host.create_cursor(pos(0, 11)).unwrap();

        // A "human" edit earlier in the line, not issued by the cursor.
        host.apply_edit(vec![BufferChange::delete(pos(0, 0), pos(0, 6))])
            .await
            .unwrap();
        assert_eq!(cursor.position(), pos(0, 5));

        cursor.insert_text("!").await.unwrap();
        assert_eq!(host.text(), "world!");
    }

    #[tokio::test]
    async fn test_two_cursors_track_independently() {
        let host = BufferHost::new("one\ntwo");
        let first = host.create_cursor(pos(0, 3)).unwrap();
        let second = host.create_cursor(pos(1, 3)).unwrap();

        first.insert_text(" more").await.unwrap();
        assert_eq!(first.position(), pos(0, 8));
        // Second cursor is on a later line; untouched.
        assert_eq!(second.position(), pos(1, 3));

        second.insert_text("!").await.unwrap();
        assert_eq!(host.text(), "one more\ntwo!");
    }

    #[tokio::test]
    async fn test_replace_line_text() {
        let host = BufferHost::new("one\ntwo\nthree");
        let cursor = host.create_cursor(pos(0, 0)).unwrap();

        let after = cursor.replace_line_text("TWO", 1).await.unwrap();
        assert_eq!(host.text(), "one\nTWO\nthree");
        assert_eq!(after, pos(1, 3));
    }

    #[tokio::test]
    async fn test_dispose_is_idempotent() {
        let host = BufferHost::new("text");
        let cursor = host.create_cursor(pos(0, 0)).unwrap();

        cursor.dispose();
        cursor.dispose();
        assert_eq!(host.cursor_count(), 0);
        assert!(cursor.is_disposed());
    }

    #[tokio::test]
    async fn test_disposed_cursor_rejects_edits() {
        let host = BufferHost::new("text");
        let cursor = host.create_cursor(pos(0, 0)).unwrap();
        cursor.dispose();

        let err = cursor.insert_text("x").await.unwrap_err();
        assert!(err.to_string().contains("disposed"));
    }

    #[tokio::test]
    async fn test_disposed_cursor_ignores_notifications() {
        let host = BufferHost::new("abc");
        let cursor = host.create_cursor(pos(0, 3)).unwrap();
        let frozen = cursor.position();
        cursor.dispose();

        host.apply_edit(vec![BufferChange::insert(pos(0, 0), "xx")])
            .await
            .unwrap();
        assert_eq!(cursor.position(), frozen);
    }

    #[tokio::test]
    async fn test_drop_unregisters_cursor() {
        let host = BufferHost::new("text");
        {
            let _cursor = host.create_cursor(pos(0, 0)).unwrap();
            assert_eq!(host.cursor_count(), 1);
        }
        assert_eq!(host.cursor_count(), 0);
    }
}
