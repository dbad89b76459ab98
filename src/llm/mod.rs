// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Model backends
//!
//! [`provider::LlmProvider`] is the seam between the engine and any model
//! backend. [`mock_provider::MockProvider`] is a scripted in-process
//! backend for tests and offline development.

pub mod mock_provider;
pub mod provider;

pub use mock_provider::MockProvider;
pub use provider::{
    Completion, EventStream, GenerationRequest, LlmProvider, StreamEvent, ToolCall, ToolSpec,
};
