// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! File read tool
//!
//! Reads a file, optionally sliced to a 0-based, end-inclusive line range.

use serde_json::Value;

use crate::error::{Result, ScribeError};
use crate::tools::definition::{BuiltinTool, SchemaBuilder};
use crate::tools::ToolContext;

pub const NAME: &str = "fs_read_file";

pub fn definition() -> BuiltinTool {
    BuiltinTool {
        name: NAME.to_string(),
        description: "Read the contents of a file. Optionally slice to a line range; \
                      line numbers are 0-based and the end line is inclusive."
            .to_string(),
        input_schema: SchemaBuilder::new()
            .string("path", "The path to the file (absolute or relative to the current document)", true)
            .integer("start_line", "First line to read (0-based, default: 0)", false)
            .integer("end_line", "Last line to read (0-based, inclusive, default: last line)", false)
            .build(),
    }
}

pub async fn execute(args: &Value, context: &ToolContext) -> Result<String> {
    let path_str = args["path"]
        .as_str()
        .ok_or_else(|| ScribeError::InvalidInput("path is required".to_string()))?;
    let path = context.resolve_path(path_str);

    let content = tokio::fs::read_to_string(&path)
        .await
        .map_err(|e| ScribeError::ToolExecution(format!("{}: {}", path.display(), e)))?;

    let lines: Vec<&str> = content.lines().collect();
    let start = args["start_line"].as_u64().unwrap_or(0) as usize;
    let end = args["end_line"]
        .as_u64()
        .map(|e| e as usize)
        .unwrap_or(lines.len().saturating_sub(1));

    if start >= lines.len() {
        return Err(ScribeError::ToolExecution(format!(
            "start_line {} past end of {} ({} lines)",
            start,
            path.display(),
            lines.len()
        )));
    }

    let end = end.min(lines.len().saturating_sub(1));
    Ok(lines[start..=end].join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn context_in(dir: &TempDir) -> ToolContext {
        ToolContext::new(Some(dir.path().join("doc.md")))
    }

    #[tokio::test]
    async fn test_read_whole_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "one\ntwo\nthree").unwrap();

        let output = execute(&serde_json::json!({"path": "a.txt"}), &context_in(&dir))
            .await
            .unwrap();
        assert_eq!(output, "one\ntwo\nthree");
    }

    #[tokio::test]
    async fn test_read_line_range_end_inclusive() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "0\n1\n2\n3\n4").unwrap();

        let output = execute(
            &serde_json::json!({"path": "a.txt", "start_line": 1, "end_line": 3}),
            &context_in(&dir),
        )
        .await
        .unwrap();
        assert_eq!(output, "1\n2\n3");
    }

    #[tokio::test]
    async fn test_end_clamped_to_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "0\n1").unwrap();

        let output = execute(
            &serde_json::json!({"path": "a.txt", "start_line": 1, "end_line": 99}),
            &context_in(&dir),
        )
        .await
        .unwrap();
        assert_eq!(output, "1");
    }

    #[tokio::test]
    async fn test_start_past_end_fails() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "only").unwrap();

        let err = execute(
            &serde_json::json!({"path": "a.txt", "start_line": 5}),
            &context_in(&dir),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("past end"));
    }

    #[tokio::test]
    async fn test_missing_file_fails() {
        let context = ToolContext::new(Some(PathBuf::from("/nowhere/doc.md")));
        let err = execute(&serde_json::json!({"path": "gone.txt"}), &context)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("gone.txt"));
    }

    #[tokio::test]
    async fn test_missing_path_argument() {
        let context = ToolContext::new(None);
        let err = execute(&serde_json::json!({}), &context).await.unwrap_err();
        assert!(err.to_string().contains("path is required"));
    }
}
