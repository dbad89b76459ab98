// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! HTTP request tool
//!
//! Issues a request and returns the response body as text, decoded using
//! the character encoding reqwest detects from the response headers.

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, ScribeError};
use crate::tools::definition::{BuiltinTool, SchemaBuilder};

pub const NAME: &str = "web_request";

pub fn definition() -> BuiltinTool {
    BuiltinTool {
        name: NAME.to_string(),
        description: "Perform an HTTP request and return the decoded response body as text."
            .to_string(),
        input_schema: SchemaBuilder::new()
            .string("url", "The URL to request", true)
            .string("method", "HTTP method (default: GET)", false)
            .string("body", "Request body", false)
            .build(),
    }
}

pub async fn execute(
    args: &Value,
    http: &reqwest::Client,
    cancel: &CancellationToken,
) -> Result<String> {
    let url = args["url"]
        .as_str()
        .ok_or_else(|| ScribeError::InvalidInput("url is required".to_string()))?;
    let method: reqwest::Method = args["method"]
        .as_str()
        .unwrap_or("GET")
        .to_uppercase()
        .parse()
        .map_err(|_| ScribeError::InvalidInput(format!("bad method: {}", args["method"])))?;

    let mut request = http.request(method, url);
    if let Some(body) = args["body"].as_str() {
        request = request.body(body.to_string());
    }

    let response = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(ScribeError::Cancelled),
        response = request.send() => response?,
    };

    let status = response.status();
    if !status.is_success() {
        return Err(ScribeError::ToolExecution(format!(
            "{} returned {}",
            url, status
        )));
    }

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ScribeError::Cancelled),
        text = response.text() => Ok(text?),
    }
}
