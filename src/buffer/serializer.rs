// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Edit serialization
//!
//! All buffer mutations issued by any active session go through one
//! [`EditSerializer`], which runs them exclusively and in submission order.

use tokio::sync::Mutex;

use crate::error::Result;

/// A mutual-exclusion gate for buffer mutations.
///
/// Tokio's mutex hands the lock to waiters in FIFO order, which is exactly
/// the ordering guarantee edits need: edits from different concurrently
/// running cursors never interleave partially and apply in the order they
/// were submitted.
#[derive(Debug, Default)]
pub struct EditSerializer {
    gate: Mutex<()>,
}

impl EditSerializer {
    /// Create a new serializer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `edit` exclusively.
    ///
    /// If `edit` fails the gate is released and the error propagates to the
    /// caller; the next queued edit proceeds normally.
    pub async fn apply<T>(&self, edit: impl FnOnce() -> Result<T>) -> Result<T> {
        let _guard = self.gate.lock().await;
        edit()
    }
}
