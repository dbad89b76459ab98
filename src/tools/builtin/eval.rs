// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Sandboxed script evaluation tool
//!
//! `eval_js` is a deliberate, documented escape hatch: the model hands back
//! a script, the tool evaluates it and returns the result as text. It is
//! disabled unless the embedder opts in, and the sandbox is a restricted
//! interpreter with hard resource limits and no filesystem, network, or
//! process access registered.

use serde_json::Value;

use crate::error::{Result, ScribeError};
use crate::tools::definition::{BuiltinTool, SchemaBuilder};

pub const NAME: &str = "eval_js";

/// Whether and how script evaluation is permitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EvalPolicy {
    /// Evaluation requests fail (the default)
    #[default]
    Disabled,
    /// Evaluation runs in the restricted interpreter
    Sandboxed,
}

pub fn definition() -> BuiltinTool {
    BuiltinTool {
        name: NAME.to_string(),
        description: "Evaluate a script in a restricted sandbox and return the result \
                      of the final expression as text."
            .to_string(),
        input_schema: SchemaBuilder::new()
            .string("code", "The script to evaluate", true)
            .build(),
    }
}

pub async fn execute(args: &Value, policy: EvalPolicy) -> Result<String> {
    let code = args["code"]
        .as_str()
        .ok_or_else(|| ScribeError::InvalidInput("code is required".to_string()))?
        .to_string();

    if policy == EvalPolicy::Disabled {
        return Err(ScribeError::ToolExecution(
            "eval_js is disabled; the embedder has not granted the evaluation capability"
                .to_string(),
        ));
    }

    // Rhai's AST is not Send; compile and run inside the blocking closure.
    tokio::task::spawn_blocking(move || {
        let mut engine = rhai::Engine::new();
        engine.set_max_expr_depths(64, 64);
        engine.set_max_operations(100_000);
        engine.set_max_string_size(1_000_000);
        engine.set_max_array_size(10_000);
        engine.set_max_map_size(10_000);

        engine
            .eval::<rhai::Dynamic>(&code)
            .map(|value| value.to_string())
            .map_err(|e| ScribeError::ToolExecution(format!("script error: {}", e)))
    })
    .await
    .map_err(|e| ScribeError::ToolExecution(format!("eval task failed: {}", e)))?
}
