// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Scribe: a streaming text-generation engine for live documents.
//!
//! Scribe drives an AI assistant whose output lands inside a document the
//! user is still editing. The pieces:
//!
//! - [`buffer`]: a shared text buffer with serialized edits and tracked
//!   cursors that survive concurrent changes
//! - [`chat`]: request assembly from document text (role markers, fenced
//!   directive blocks, media references), the session tool loop, and
//!   line-buffered stream consumption
//! - [`tools`]: tool resolution from reference tokens, builtin tools, and
//!   recursive document-defined tools
//! - [`llm`]: the provider seam and a scripted mock backend
//!
//! ```no_run
//! use std::sync::Arc;
//! use scribe::buffer::{BufferHost, Position};
//! use scribe::chat::{ChatRequestBuilder, ChatSession, StreamConsumer};
//! use scribe::llm::MockProvider;
//! use scribe::tools::{ToolContext, ToolProvider};
//!
//! # async fn run() -> scribe::Result<()> {
//! let llm = Arc::new(MockProvider::new());
//! let tools = Arc::new(ToolProvider::new(llm.clone()));
//!
//! let request = ChatRequestBuilder::new(ToolContext::new(None))
//!     .with_user_message("Draft an introduction.")
//!     .build(&tools)
//!     .await?;
//!
//! let host = BufferHost::new("# Notes\n");
//! let cursor = host.create_cursor(Position::new(1, 0))?;
//!
//! let session = ChatSession::new(llm);
//! let consumer = StreamConsumer::new(cursor, session.cancel_token());
//! consumer.consume(session.stream(tools, request)).await?;
//! # Ok(())
//! # }
//! ```

pub mod buffer;
pub mod chat;
pub mod error;
pub mod llm;
pub mod tools;

pub use error::{Result, ScribeError};
