// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Position tracking through buffer edits
//!
//! A [`Position`] is a (line, column) coordinate into a text buffer. The
//! transform in this module maps a position through an arbitrary edit so
//! that it keeps denoting the same logical location. This is the invariant
//! the whole streaming pipeline leans on: a generation stream performs many
//! small inserts immediately adjacent to the tracked position, and the
//! position must not drift.
//!
//! Columns are measured in characters, not bytes.

use serde::{Deserialize, Serialize};

/// An immutable (line, column) coordinate in a text buffer.
///
/// Ordered by line first, then column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    /// Zero-based line number
    pub line: usize,
    /// Zero-based character offset within the line
    pub column: usize,
}

impl Position {
    /// Create a new position.
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    /// Map this position through a single buffer change.
    ///
    /// - A change starting strictly after this position leaves it untouched.
    /// - A position inside the replaced span collapses onto the insertion
    ///   point and advances past the inserted text. A position exactly at
    ///   the edit point behaves the same way, which is what lets a streaming
    ///   cursor ride its own inserts.
    /// - A change entirely before this position shifts it by the deleted
    ///   span's line/column delta, then by the inserted text's shape.
    pub fn transform(self, change: &BufferChange) -> Self {
        let start = change.range_start;
        let end = change.range_end;

        if start > self {
            return self;
        }

        let inserted_end = change.inserted_end();

        if self <= end {
            // Inside the replaced span (or exactly at the edit point):
            // collapse onto the end of the inserted text.
            return inserted_end;
        }

        // Change is entirely before this position.
        if self.line == end.line {
            Position::new(
                inserted_end.line,
                inserted_end.column + (self.column - end.column),
            )
        } else {
            Position::new(
                self.line - (end.line - start.line) + change.inserted_line_breaks(),
                self.column,
            )
        }
    }

    /// Fold a batch of simultaneous changes into this position.
    ///
    /// Changes within one notification batch are processed in descending
    /// start order, so every change is applied against coordinates that the
    /// later (higher-offset) changes have not yet shifted.
    pub fn transform_batch(self, changes: &[BufferChange]) -> Self {
        let mut ordered: Vec<&BufferChange> = changes.iter().collect();
        ordered.sort_by(|a, b| b.range_start.cmp(&a.range_start));
        ordered
            .into_iter()
            .fold(self, |position, change| position.transform(change))
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A single atomic substitution of `[range_start, range_end)` with `text`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferChange {
    /// Start of the replaced span
    pub range_start: Position,
    /// End of the replaced span (exclusive in the buffer, but a tracked
    /// position sitting exactly here still collapses onto the insertion)
    pub range_end: Position,
    /// Replacement text
    pub text: String,
}

impl BufferChange {
    /// A pure insertion at `at`.
    pub fn insert(at: Position, text: impl Into<String>) -> Self {
        Self {
            range_start: at,
            range_end: at,
            text: text.into(),
        }
    }

    /// A replacement of `[start, end)` with `text`.
    pub fn replace(start: Position, end: Position, text: impl Into<String>) -> Self {
        Self {
            range_start: start,
            range_end: end,
            text: text.into(),
        }
    }

    /// A pure deletion of `[start, end)`.
    pub fn delete(start: Position, end: Position) -> Self {
        Self::replace(start, end, "")
    }

    /// Number of line breaks in the inserted text.
    fn inserted_line_breaks(&self) -> usize {
        self.text.matches('\n').count()
    }

    /// Position immediately after the inserted text once placed.
    pub(crate) fn inserted_end(&self) -> Position {
        match self.text.rfind('\n') {
            Some(idx) => Position::new(
                self.range_start.line + self.inserted_line_breaks(),
                self.text[idx + 1..].chars().count(),
            ),
            None => Position::new(
                self.range_start.line,
                self.range_start.column + self.text.chars().count(),
            ),
        }
    }
}
