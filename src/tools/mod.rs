// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Tool system
//!
//! Tools are resolved from reference tokens embedded in document text
//! (`@group`, `^prefix`, bare builtin names, document paths), registered
//! into a per-request [`ToolContext`], and executed by the
//! [`provider::ToolProvider`] — including recursively, when a tool is
//! itself defined by a document.

pub mod builtin;
pub mod definition;
pub mod document;
pub mod provider;

pub use definition::{
    BuiltinTool, DocumentTool, HostTool, ProviderTool, SchemaBuilder, ToolDefinition,
};
pub use builtin::EvalPolicy;
pub use provider::{HostContent, HostEnvironment, ToolProvider, ToolSet};

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Depth bound for document-tool recursion. A tool document that references
/// itself, directly or indirectly, fails at this depth instead of looping.
pub const MAX_TOOL_DEPTH: usize = 8;

/// Per-request tool scope.
///
/// Scopes relative-path resolution to the request's own document and holds
/// the name-keyed tool registry. A nested tool execution receives a cloned
/// context (definitions snapshotted by value) so nested resolution cannot
/// mutate the parent's live registry.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    /// The document the request originates from; relative tool references
    /// resolve against its parent directory
    pub scope_document: Option<PathBuf>,

    /// Registered tools, keyed by name
    definitions: HashMap<String, ToolDefinition>,

    /// Current document-tool nesting depth
    pub depth: usize,
}

impl ToolContext {
    /// Create a context scoped to `document`.
    pub fn new(document: Option<PathBuf>) -> Self {
        Self {
            scope_document: document,
            definitions: HashMap::new(),
            depth: 0,
        }
    }

    /// Register a tool. Last registration under a name wins; overwriting
    /// logs a warning.
    pub fn register(&mut self, definition: ToolDefinition) {
        let name = definition.name().to_string();
        if self.definitions.insert(name.clone(), definition).is_some() {
            tracing::warn!(tool = %name, "tool re-registered, previous definition replaced");
        }
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.definitions.get(name)
    }

    /// All registered tools.
    pub fn definitions(&self) -> impl Iterator<Item = &ToolDefinition> {
        self.definitions.values()
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Whether no tools are registered.
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Snapshot this context for a nested tool execution, rescoped to the
    /// nested tool's own document and one level deeper.
    pub fn child(&self, document: Option<PathBuf>) -> Self {
        Self {
            scope_document: document,
            definitions: self.definitions.clone(),
            depth: self.depth + 1,
        }
    }

    /// Resolve a possibly-relative path against the scope document's
    /// directory.
    pub fn resolve_path(&self, reference: &str) -> PathBuf {
        let path = Path::new(reference);
        if path.is_absolute() {
            return path.to_path_buf();
        }
        match self
            .scope_document
            .as_deref()
            .and_then(Path::parent)
        {
            Some(parent) => parent.join(path),
            None => path.to_path_buf(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::definition::BuiltinTool;

    fn builtin(name: &str) -> ToolDefinition {
        ToolDefinition::Builtin(BuiltinTool {
            name: name.to_string(),
            description: String::new(),
            input_schema: SchemaBuilder::new().build(),
        })
    }

    #[test]
    fn test_register_and_get() {
        let mut context = ToolContext::new(None);
        context.register(builtin("a"));
        assert!(context.get("a").is_some());
        assert!(context.get("b").is_none());
        assert_eq!(context.len(), 1);
    }

    #[test]
    fn test_last_registration_wins() {
        let mut context = ToolContext::new(None);
        context.register(builtin("dup"));
        context.register(ToolDefinition::Provider(ProviderTool {
            name: "dup".to_string(),
            config: serde_json::json!({}),
        }));
        assert_eq!(context.len(), 1);
        assert!(matches!(
            context.get("dup"),
            Some(ToolDefinition::Provider(_))
        ));
    }

    #[test]
    fn test_child_snapshots_definitions() {
        let mut parent = ToolContext::new(Some(PathBuf::from("/docs/a.md")));
        parent.register(builtin("a"));

        let mut child = parent.child(Some(PathBuf::from("/docs/tools/b.md")));
        assert_eq!(child.depth, 1);
        assert!(child.get("a").is_some());

        // Mutating the child must not leak into the parent.
        child.register(builtin("b"));
        assert!(parent.get("b").is_none());
    }

    #[test]
    fn test_resolve_relative_path_against_scope() {
        let context = ToolContext::new(Some(PathBuf::from("/workspace/doc.md")));
        assert_eq!(
            context.resolve_path("tools/helper.md"),
            PathBuf::from("/workspace/tools/helper.md")
        );
        assert_eq!(
            context.resolve_path("/abs/helper.md"),
            PathBuf::from("/abs/helper.md")
        );
    }

    #[test]
    fn test_resolve_path_without_scope() {
        let context = ToolContext::new(None);
        assert_eq!(context.resolve_path("x.md"), PathBuf::from("x.md"));
    }
}
