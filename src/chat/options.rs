// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Merge-accumulated generation options
//!
//! Options arrive incrementally from fenced `copilot-options` blocks and
//! deep-merge onto whatever accumulated earlier: object keys merge
//! recursively, arrays concatenate, scalars overwrite.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;

/// Accumulated options for one request.
///
/// Unknown keys are kept in the flattened extra map and forwarded to the
/// provider opaquely.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CopilotOptions {
    /// Model override
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Sampling temperature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,

    /// Tool-choice directive
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<String>,

    /// Response-format constraint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<Value>,

    /// Streaming on/off (on when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,

    /// Provider-specific options
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CopilotOptions {
    /// Whether this request streams. Defaults to streaming.
    pub fn is_streaming(&self) -> bool {
        self.stream.unwrap_or(true)
    }

    /// Deep-merge a raw options object onto this value.
    pub fn merge_value(&mut self, overlay: Value) -> Result<()> {
        let mut base = serde_json::to_value(&*self)?;
        deep_merge(&mut base, overlay);
        *self = serde_json::from_value(base)?;
        Ok(())
    }

    /// Deep-merge another options value onto this one.
    pub fn merge(&mut self, other: &CopilotOptions) -> Result<()> {
        self.merge_value(serde_json::to_value(other)?)
    }
}

/// Deep-merge `overlay` into `base`: objects merge recursively, arrays
/// concatenate, anything else overwrites.
pub fn deep_merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => {
                        base_map.insert(key, overlay_value);
                    }
                }
            }
        }
        (Value::Array(base_items), Value::Array(overlay_items)) => {
            base_items.extend(overlay_items);
        }
        (base_slot, overlay_value) => *base_slot = overlay_value,
    }
}
