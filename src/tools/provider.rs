// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Tool resolution and execution
//!
//! [`ToolProvider`] turns tool-reference tokens into registered
//! [`ToolDefinition`]s and executes them when the model calls. Document
//! tools execute by building and running a nested, non-streaming chat
//! session over the tool document's own content; cancellation propagates
//! into that nested session through a child token.

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::chat::builder::ChatRequestBuilder;
use crate::chat::session::ChatSession;
use crate::error::{Result, ScribeError};
use crate::llm::provider::{LlmProvider, ToolSpec};
use crate::tools::builtin::{self, EvalPolicy};
use crate::tools::definition::{DocumentTool, ProviderTool, ToolDefinition};
use crate::tools::{ToolContext, MAX_TOOL_DEPTH};

/// The embedding environment's tool surface.
///
/// Host tools live outside this crate (an editor, an extension host); this
/// trait is the proxy boundary.
#[async_trait::async_trait]
pub trait HostEnvironment: Send + Sync {
    /// All tools the host offers.
    fn list_tools(&self) -> Vec<crate::tools::definition::HostTool>;

    /// Invoke a host tool. Rich results are normalized to text by the
    /// caller.
    async fn invoke_tool(
        &self,
        name: &str,
        arguments: &Value,
        cancel: &CancellationToken,
    ) -> Result<Vec<HostContent>>;
}

/// One part of a host tool's (possibly rich) result
#[derive(Debug, Clone)]
pub enum HostContent {
    /// Plain text
    Text(String),
    /// Structured data; rendered as pretty JSON
    Json(Value),
}

/// Flatten a host tool's rich result into plain text.
pub fn normalize_host_content(parts: &[HostContent]) -> String {
    parts
        .iter()
        .map(|part| match part {
            HostContent::Text(text) => text.clone(),
            HostContent::Json(value) => {
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Binds a provider-native tool into whatever opaque shape the backend
/// expects in its request.
pub type ProviderToolFactory = Box<dyn Fn(&ProviderTool) -> Result<Value> + Send + Sync>;

/// Executable tool surface for one model call: the specs advertised for
/// locally executed tools, plus opaque bindings for provider-native ones.
#[derive(Debug, Default)]
pub struct ToolSet {
    pub specs: Vec<ToolSpec>,
    pub provider_bindings: Vec<Value>,
}

/// The shape a document tool's final response must take.
#[derive(Debug, Deserialize)]
struct DocumentToolResponse {
    final_answer: String,
    #[serde(default)]
    #[allow(dead_code)]
    think: Vec<String>,
}

/// Resolves tool-reference tokens and executes tool calls.
pub struct ToolProvider {
    llm: Arc<dyn LlmProvider>,
    host: Option<Arc<dyn HostEnvironment>>,
    http: reqwest::Client,
    eval_policy: EvalPolicy,
    factories: HashMap<String, ProviderToolFactory>,
}

impl ToolProvider {
    /// Create a provider that runs nested document-tool sessions against
    /// `llm`.
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self {
            llm,
            host: None,
            http: reqwest::Client::new(),
            eval_policy: EvalPolicy::Disabled,
            factories: HashMap::new(),
        }
    }

    /// Attach the embedding environment's tool surface.
    pub fn with_host(mut self, host: Arc<dyn HostEnvironment>) -> Self {
        self.host = Some(host);
        self
    }

    /// Grant the script-evaluation capability.
    pub fn with_eval_policy(mut self, policy: EvalPolicy) -> Self {
        self.eval_policy = policy;
        self
    }

    /// Register a factory that binds a provider-native tool (e.g. native
    /// web search) into the backend's request shape.
    pub fn with_provider_factory(
        mut self,
        name: impl Into<String>,
        factory: ProviderToolFactory,
    ) -> Self {
        self.factories.insert(name.into(), factory);
        self
    }

    /// Resolve one tool-reference token, registering everything it expands
    /// to into `context`.
    ///
    /// Grammar: `@<group>` (builtin group), `^<prefix>` (host tools by name
    /// prefix), a bare builtin name, or a document path.
    pub async fn resolve_tool_text(
        &self,
        context: &mut ToolContext,
        token: &str,
    ) -> Result<Vec<ToolDefinition>> {
        let token = token.trim();

        if let Some(group_name) = token.strip_prefix('@') {
            let members = builtin::group(group_name).ok_or_else(|| {
                ScribeError::ToolResolution(format!(
                    "unknown tool group: @{} (valid groups: {})",
                    group_name,
                    builtin::group_names().join(", ")
                ))
            })?;
            let mut resolved = Vec::new();
            for member in members {
                resolved.push(self.builtin_or_provider(member));
            }
            for definition in &resolved {
                context.register(definition.clone());
            }
            return Ok(resolved);
        }

        if let Some(prefix) = token.strip_prefix('^') {
            let host = self.host.as_ref().ok_or_else(|| {
                ScribeError::ToolResolution(format!(
                    "^{}: no host environment is attached",
                    prefix
                ))
            })?;
            let matched: Vec<ToolDefinition> = host
                .list_tools()
                .into_iter()
                .filter(|tool| tool.name.starts_with(prefix))
                .map(ToolDefinition::Host)
                .collect();
            if matched.is_empty() {
                return Err(ScribeError::ToolResolution(format!(
                    "no host tools match prefix: ^{}",
                    prefix
                )));
            }
            for definition in &matched {
                context.register(definition.clone());
            }
            return Ok(matched);
        }

        if builtin::find(token).is_some() || token == builtin::WEB_SEARCH {
            let definition = self.builtin_or_provider(token);
            context.register(definition.clone());
            return Ok(vec![definition]);
        }

        // Anything else is a document reference.
        let source = context.resolve_path(token);
        let content = tokio::fs::read_to_string(&source).await.map_err(|e| {
            ScribeError::ToolResolution(format!("{}: {}", source.display(), e))
        })?;
        let parsed = crate::tools::document::parse_tool_document(&source, &content)?;
        let definition = ToolDefinition::Document(DocumentTool {
            name: parsed.name,
            description: parsed.description,
            input_schema: parsed.input_schema,
            source,
        });
        context.register(definition.clone());
        Ok(vec![definition])
    }

    fn builtin_or_provider(&self, name: &str) -> ToolDefinition {
        match builtin::find(name) {
            Some(tool) => ToolDefinition::Builtin(tool),
            None => ToolDefinition::Provider(ProviderTool {
                name: name.to_string(),
                config: serde_json::json!({}),
            }),
        }
    }

    /// Materialize the executable tool surface for one model call.
    ///
    /// Provider-native tools require a registered factory; everything else
    /// is advertised by its local spec and executed via
    /// [`ToolProvider::execute_tool`].
    pub fn new_tool_set(&self, context: &ToolContext) -> Result<ToolSet> {
        let mut set = ToolSet::default();
        for definition in context.definitions() {
            match definition {
                ToolDefinition::Provider(tool) => {
                    let factory = self.factories.get(&tool.name).ok_or_else(|| {
                        ScribeError::ToolResolution(format!(
                            "provider-native tool {} has no registered factory",
                            tool.name
                        ))
                    })?;
                    set.provider_bindings.push(factory(tool)?);
                }
                other => {
                    if let Some(spec) = other.spec() {
                        set.specs.push(spec);
                    }
                }
            }
        }
        Ok(set)
    }

    /// Execute one tool call and return its text result.
    ///
    /// Boxed because document tools recurse through a nested session.
    pub fn execute_tool<'a>(
        &'a self,
        context: &'a ToolContext,
        definition: &'a ToolDefinition,
        arguments: &'a Value,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<String>> {
        async move {
            if cancel.is_cancelled() {
                return Err(ScribeError::Cancelled);
            }
            match definition {
                ToolDefinition::Builtin(tool) => match tool.name.as_str() {
                    builtin::fs_read_file::NAME => {
                        builtin::fs_read_file::execute(arguments, context).await
                    }
                    builtin::fs_read_dir::NAME => {
                        builtin::fs_read_dir::execute(arguments, context).await
                    }
                    builtin::fs_find_files::NAME => {
                        builtin::fs_find_files::execute(arguments, context).await
                    }
                    builtin::eval::NAME => {
                        builtin::eval::execute(arguments, self.eval_policy).await
                    }
                    builtin::web_request::NAME => {
                        builtin::web_request::execute(arguments, &self.http, cancel).await
                    }
                    other => Err(ScribeError::ToolExecution(format!(
                        "unknown builtin: {}",
                        other
                    ))),
                },
                ToolDefinition::Document(tool) => {
                    self.execute_document_tool(context, tool, arguments, cancel)
                        .await
                }
                ToolDefinition::Host(tool) => {
                    let host = self.host.as_ref().ok_or_else(|| {
                        ScribeError::ToolExecution(format!(
                            "{}: no host environment is attached",
                            tool.name
                        ))
                    })?;
                    let parts = host.invoke_tool(&tool.name, arguments, cancel).await?;
                    Ok(normalize_host_content(&parts))
                }
                ToolDefinition::Provider(tool) => Err(ScribeError::ToolExecution(format!(
                    "{} is provider-native and executes on the backend",
                    tool.name
                ))),
            }
        }
        .boxed()
    }

    /// Run a document tool through a nested, non-streaming chat session.
    async fn execute_document_tool(
        &self,
        context: &ToolContext,
        tool: &DocumentTool,
        arguments: &Value,
        cancel: &CancellationToken,
    ) -> Result<String> {
        if context.depth + 1 > MAX_TOOL_DEPTH {
            return Err(ScribeError::ToolRecursion(context.depth + 1));
        }

        // Fetch and re-parse the defining document; its body is the nested
        // session's system content.
        let content = tokio::fs::read_to_string(&tool.source).await.map_err(|e| {
            ScribeError::ToolExecution(format!("{}: {}", tool.source.display(), e))
        })?;
        let parsed = crate::tools::document::parse_tool_document(&tool.source, &content)?;

        let mut merged_arguments = parsed
            .default_parameters
            .clone()
            .unwrap_or_else(|| serde_json::json!({}));
        crate::chat::options::deep_merge(&mut merged_arguments, arguments.clone());

        let preamble = serde_json::json!({
            "arguments": merged_arguments,
            "current_document": context
                .scope_document
                .as_ref()
                .map(|p| p.display().to_string()),
            "current_time": chrono::Utc::now().to_rfc3339(),
        });

        // Tools and options declared inside the tool document configure its
        // nested session.
        let (_, blocks) = crate::chat::directives::extract_directives(&content);
        let mut builder = ChatRequestBuilder::new(context.child(Some(tool.source.clone())));
        for block in blocks {
            builder.ingest_block(block);
        }
        let request = builder
            .with_system_prompt(&parsed.system_content)
            .with_user_message(&serde_json::to_string_pretty(&preamble)?)
            .build(self)
            .await?;

        tracing::debug!(tool = %tool.name, depth = context.depth + 1, "running document tool");

        let session = ChatSession::with_cancel(self.llm.clone(), cancel.child_token());
        let answer = session.complete_json(self, &request).await?;

        let response: DocumentToolResponse =
            serde_json::from_str(&answer).map_err(|_| ScribeError::ToolResponse {
                source_document: tool.source.display().to_string(),
                raw_body: answer.clone(),
            })?;
        Ok(response.final_answer)
    }
}

impl std::fmt::Debug for ToolProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolProvider")
            .field("has_host", &self.host.is_some())
            .field("eval_policy", &self.eval_policy)
            .field("factories", &self.factories.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock_provider::MockProvider;
    use crate::tools::definition::HostTool;
    use crate::tools::SchemaBuilder;

    struct FakeHost;

    #[async_trait::async_trait]
    impl HostEnvironment for FakeHost {
        fn list_tools(&self) -> Vec<HostTool> {
            vec![
                HostTool {
                    name: "editor_rename".to_string(),
                    description: "Rename a symbol".to_string(),
                    input_schema: SchemaBuilder::new().build(),
                },
                HostTool {
                    name: "editor_format".to_string(),
                    description: "Format the document".to_string(),
                    input_schema: SchemaBuilder::new().build(),
                },
                HostTool {
                    name: "vcs_blame".to_string(),
                    description: "Blame a line".to_string(),
                    input_schema: SchemaBuilder::new().build(),
                },
            ]
        }

        async fn invoke_tool(
            &self,
            name: &str,
            _arguments: &Value,
            _cancel: &CancellationToken,
        ) -> Result<Vec<HostContent>> {
            Ok(vec![
                HostContent::Text(format!("{} done", name)),
                HostContent::Json(serde_json::json!({"changed": 2})),
            ])
        }
    }

    fn provider() -> ToolProvider {
        ToolProvider::new(Arc::new(MockProvider::new())).with_host(Arc::new(FakeHost))
    }

    #[tokio::test]
    async fn test_resolve_builtin_group() {
        let tool_provider = provider();
        let mut context = ToolContext::new(None);
        let resolved = tool_provider
            .resolve_tool_text(&mut context, "@fs")
            .await
            .unwrap();
        assert_eq!(resolved.len(), 3);
        assert!(context.get("fs_read_file").is_some());
        assert!(context.get("fs_find_files").is_some());
    }

    #[tokio::test]
    async fn test_unknown_group_lists_valid_groups() {
        let tool_provider = provider();
        let mut context = ToolContext::new(None);
        let err = tool_provider
            .resolve_tool_text(&mut context, "@nope")
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("@nope"));
        assert!(message.contains("fs"));
        assert!(message.contains("web"));
        assert!(message.contains("eval"));
    }

    #[tokio::test]
    async fn test_resolve_host_prefix() {
        let tool_provider = provider();
        let mut context = ToolContext::new(None);
        let resolved = tool_provider
            .resolve_tool_text(&mut context, "^editor_")
            .await
            .unwrap();
        assert_eq!(resolved.len(), 2);
        assert!(context.get("editor_rename").is_some());
        assert!(context.get("vcs_blame").is_none());
    }

    #[tokio::test]
    async fn test_empty_prefix_match_is_hard_error() {
        let tool_provider = provider();
        let mut context = ToolContext::new(None);
        let err = tool_provider
            .resolve_tool_text(&mut context, "^zzz")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("^zzz"));
    }

    #[tokio::test]
    async fn test_resolve_bare_builtin() {
        let tool_provider = provider();
        let mut context = ToolContext::new(None);
        let resolved = tool_provider
            .resolve_tool_text(&mut context, "fs_read_file")
            .await
            .unwrap();
        assert!(matches!(resolved[0], ToolDefinition::Builtin(_)));
    }

    #[tokio::test]
    async fn test_resolve_web_search_as_provider_native() {
        let tool_provider = provider();
        let mut context = ToolContext::new(None);
        let resolved = tool_provider
            .resolve_tool_text(&mut context, "web_search")
            .await
            .unwrap();
        assert!(matches!(resolved[0], ToolDefinition::Provider(_)));
    }

    #[tokio::test]
    async fn test_resolve_document_reference() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("helper.md"),
            "```ts copilot-tool-definition\nfunction helper(q: string)\n```\nYou help.",
        )
        .unwrap();

        let tool_provider = provider();
        let mut context = ToolContext::new(Some(dir.path().join("doc.md")));
        let resolved = tool_provider
            .resolve_tool_text(&mut context, "helper.md")
            .await
            .unwrap();
        assert_eq!(resolved[0].name(), "helper");
        assert!(matches!(resolved[0], ToolDefinition::Document(_)));
    }

    #[tokio::test]
    async fn test_missing_document_is_hard_error() {
        let tool_provider = provider();
        let mut context = ToolContext::new(None);
        let err = tool_provider
            .resolve_tool_text(&mut context, "no/such/tool.md")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("tool.md"));
    }

    #[tokio::test]
    async fn test_new_tool_set_requires_provider_factory() {
        let tool_provider = provider();
        let mut context = ToolContext::new(None);
        tool_provider
            .resolve_tool_text(&mut context, "web_search")
            .await
            .unwrap();

        let err = tool_provider.new_tool_set(&context).unwrap_err();
        assert!(err.to_string().contains("web_search"));
    }

    #[tokio::test]
    async fn test_new_tool_set_binds_factories_and_specs() {
        let tool_provider = provider().with_provider_factory(
            "web_search",
            Box::new(|tool| Ok(serde_json::json!({"type": "web_search", "name": tool.name}))),
        );
        let mut context = ToolContext::new(None);
        tool_provider
            .resolve_tool_text(&mut context, "@web")
            .await
            .unwrap();

        let set = tool_provider.new_tool_set(&context).unwrap();
        assert_eq!(set.specs.len(), 1);
        assert_eq!(set.specs[0].name, "web_request");
        assert_eq!(set.provider_bindings.len(), 1);
        assert_eq!(set.provider_bindings[0]["type"], "web_search");
    }

    #[tokio::test]
    async fn test_execute_host_tool_normalizes_rich_result() {
        let tool_provider = provider();
        let mut context = ToolContext::new(None);
        let resolved = tool_provider
            .resolve_tool_text(&mut context, "^editor_rename")
            .await
            .unwrap();

        let output = tool_provider
            .execute_tool(
                &context,
                &resolved[0],
                &serde_json::json!({}),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(output.contains("editor_rename done"));
        assert!(output.contains("\"changed\": 2"));
    }

    #[tokio::test]
    async fn test_execute_provider_tool_is_an_error() {
        let tool_provider = provider();
        let context = ToolContext::new(None);
        let definition = ToolDefinition::Provider(ProviderTool {
            name: "web_search".to_string(),
            config: serde_json::json!({}),
        });
        let err = tool_provider
            .execute_tool(
                &context,
                &definition,
                &serde_json::json!({}),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("provider-native"));
    }

    #[tokio::test]
    async fn test_execute_cancelled_before_dispatch() {
        let tool_provider = provider();
        let context = ToolContext::new(None);
        let definition = ToolDefinition::Builtin(builtin::fs_read_file::definition());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = tool_provider
            .execute_tool(&context, &definition, &serde_json::json!({}), &cancel)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn test_depth_bound_is_enforced() {
        let dir = tempfile::TempDir::new().unwrap();
        let source = dir.path().join("loop.md");
        std::fs::write(
            &source,
            "```ts copilot-tool-definition\nfunction looper(q: string)\n```\nLoop forever.",
        )
        .unwrap();

        let tool_provider = provider();
        let mut context = ToolContext::new(Some(dir.path().join("doc.md")));
        // Simulate a deeply nested call chain.
        for _ in 0..MAX_TOOL_DEPTH {
            context = context.child(context.scope_document.clone());
        }
        let definition = ToolDefinition::Document(DocumentTool {
            name: "looper".to_string(),
            description: String::new(),
            input_schema: SchemaBuilder::new().build(),
            source,
        });

        let err = tool_provider
            .execute_tool(
                &context,
                &definition,
                &serde_json::json!({}),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ScribeError::ToolRecursion(_)));
    }

    #[test]
    fn test_normalize_host_content() {
        let parts = vec![
            HostContent::Text("line".to_string()),
            HostContent::Json(serde_json::json!({"k": 1})),
        ];
        let text = normalize_host_content(&parts);
        assert!(text.starts_with("line\n"));
        assert!(text.contains("\"k\": 1"));
    }
}
