// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Glob search tool

use serde_json::Value;

use crate::error::{Result, ScribeError};
use crate::tools::definition::{BuiltinTool, SchemaBuilder};
use crate::tools::ToolContext;

pub const NAME: &str = "fs_find_files";

const DEFAULT_MAX_RESULTS: usize = 200;

pub fn definition() -> BuiltinTool {
    BuiltinTool {
        name: NAME.to_string(),
        description: "Find files matching a glob pattern. Returns one path per line."
            .to_string(),
        input_schema: SchemaBuilder::new()
            .string("include", "Glob pattern to match (relative to the current document)", true)
            .array("exclude", "Glob patterns to filter out", "string", false)
            .integer("max_results", "Maximum number of paths to return (default: 200)", false)
            .build(),
    }
}

pub async fn execute(args: &Value, context: &ToolContext) -> Result<String> {
    let include = args["include"]
        .as_str()
        .ok_or_else(|| ScribeError::InvalidInput("include is required".to_string()))?;
    let max_results = args["max_results"]
        .as_u64()
        .map(|m| m as usize)
        .unwrap_or(DEFAULT_MAX_RESULTS);

    let exclude: Vec<glob::Pattern> = args["exclude"]
        .as_array()
        .map(|patterns| {
            patterns
                .iter()
                .filter_map(|p| p.as_str())
                .map(glob::Pattern::new)
                .collect::<std::result::Result<Vec<_>, _>>()
        })
        .transpose()
        .map_err(|e| ScribeError::InvalidInput(format!("bad exclude pattern: {}", e)))?
        .unwrap_or_default();

    let pattern = context.resolve_path(include);
    let pattern_str = pattern.to_string_lossy();

    let mut results = Vec::new();
    let paths = glob::glob(&pattern_str)
        .map_err(|e| ScribeError::InvalidInput(format!("bad include pattern: {}", e)))?;
    for entry in paths {
        let path = entry.map_err(|e| ScribeError::ToolExecution(e.to_string()))?;
        if exclude.iter().any(|p| p.matches_path(&path)) {
            continue;
        }
        results.push(path.to_string_lossy().to_string());
        if results.len() >= max_results {
            break;
        }
    }

    Ok(results.join("\n"))
}
