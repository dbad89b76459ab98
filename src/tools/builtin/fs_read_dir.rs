// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Directory listing tool
//!
//! Lists a directory as a JSON map of entry name to type/size/mtime.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::{Result, ScribeError};
use crate::tools::definition::{BuiltinTool, SchemaBuilder};
use crate::tools::ToolContext;

pub const NAME: &str = "fs_read_dir";

pub fn definition() -> BuiltinTool {
    BuiltinTool {
        name: NAME.to_string(),
        description: "List a directory. Returns a JSON map of entry name to \
                      {type, size, mtime}."
            .to_string(),
        input_schema: SchemaBuilder::new()
            .string("path", "The directory path (absolute or relative to the current document)", true)
            .build(),
    }
}

pub async fn execute(args: &Value, context: &ToolContext) -> Result<String> {
    let path_str = args["path"]
        .as_str()
        .ok_or_else(|| ScribeError::InvalidInput("path is required".to_string()))?;
    let path = context.resolve_path(path_str);

    let mut reader = tokio::fs::read_dir(&path)
        .await
        .map_err(|e| ScribeError::ToolExecution(format!("{}: {}", path.display(), e)))?;

    let mut entries = serde_json::Map::new();
    while let Some(entry) = reader
        .next_entry()
        .await
        .map_err(|e| ScribeError::ToolExecution(e.to_string()))?
    {
        let metadata = match entry.metadata().await {
            Ok(m) => m,
            Err(_) => continue,
        };
        let kind = if metadata.is_dir() {
            "dir"
        } else if metadata.is_symlink() {
            "symlink"
        } else {
            "file"
        };
        let mtime = metadata
            .modified()
            .ok()
            .map(|t| DateTime::<Utc>::from(t).to_rfc3339());
        entries.insert(
            entry.file_name().to_string_lossy().to_string(),
            serde_json::json!({
                "type": kind,
                "size": metadata.len(),
                "mtime": mtime,
            }),
        );
    }

    Ok(serde_json::to_string_pretty(&Value::Object(entries))?)
}
