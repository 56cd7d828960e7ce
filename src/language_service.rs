//! `LanguageService`: the contract a per-language backend must satisfy (spec §4.5).
//!
//! The core never inspects a backend's internals; it calls through this trait and reacts
//! only to the connection state machine. Concrete backends (the AST-language service, the
//! C-family service) live outside this crate.

use async_trait::async_trait;
use serde_json::Value;
use tower_lsp::jsonrpc::Result as RpcResult;
use tower_lsp::lsp_types::*;

use crate::document::DocumentSnapshot;
use crate::error::CoreError;
use crate::workspace::Workspace;

/// Connection state for one backend instance (spec §4.5 state machine).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendState {
    Connected,
    ConnectionInterrupted,
    SemanticFunctionalityDisabled,
}

/// Identifies which side of a cross-language pair produced a name or occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LanguageFamily {
    /// The AST-driven backend (e.g. a Swift-like frontend).
    AstLanguage,
    /// The clang-family backend (C, C++, Objective-C).
    ClangFamily,
}

/// A position expressed the way the index and cross-language rename engine exchange
/// occurrences: 1-based line, 1-based UTF-8 column (spec §3 `RenameLocation`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: u32,
    pub utf8_column: u32,
}

/// The single extension-based heuristic this core uses to decide which backend family owns
/// a URI. Shared by `ServiceRegistry::service_for_uri`, the backend state-change reconciler,
/// and the cross-language rename engine's seed-family lookup, so the three never disagree.
pub fn family_for_uri(uri: &Url) -> LanguageFamily {
    if uri.path().ends_with(".swift") {
        LanguageFamily::AstLanguage
    } else {
        LanguageFamily::ClangFamily
    }
}

/// The interface over a single backend instance. Object-safe so the dispatcher can hold
/// `Arc<dyn LanguageService>` without knowing the concrete backend type; `async-trait` is
/// needed here (unlike the outer `tower_lsp::LanguageServer`, which generates its own
/// object-safe glue) because this trait is defined, not generated, in this crate.
#[async_trait]
pub trait LanguageService: Send + Sync {
    /// Returns true if this backend instance can also serve `workspace`, allowing the
    /// dispatcher to share one instance across workspaces (spec §3 `LanguageService`).
    fn can_handle(&self, workspace: &Workspace) -> bool;

    async fn initialize(&self, params: InitializeParams) -> RpcResult<InitializeResult>;
    async fn shutdown(&self) -> RpcResult<()>;

    fn state(&self) -> BackendState;

    /// Subscribes to this backend's state transitions (spec §4.5 "Lifecycle:
    /// `addStateChangeHandler(fn)`"). The backend owns when and how often it calls `handler`;
    /// the default does nothing, for backends that never leave `Connected`. A backend that
    /// models a real out-of-process connection (e.g. over a socket) is expected to call the
    /// handler on every `connected`/`connectionInterrupted`/`semanticFunctionalityDisabled`
    /// transition so the dispatcher can react (reopen flow, outage progress).
    fn add_state_change_handler(&self, handler: StateChangeHandler) {
        let _ = handler;
    }

    async fn open_document(&self, snapshot: &DocumentSnapshot) -> Result<(), CoreError>;
    async fn close_document(&self, uri: &Url) -> Result<(), CoreError>;
    async fn reopen_document(&self, snapshot: &DocumentSnapshot) -> Result<(), CoreError>;
    async fn change_document(
        &self,
        pre: &DocumentSnapshot,
        post: &DocumentSnapshot,
        edits: &[crate::document::SourceEdit],
    ) -> Result<(), CoreError>;

    async fn document_updated_build_settings(&self, uri: &Url) -> Result<(), CoreError>;
    async fn document_dependencies_updated(&self, uris: &[Url]) -> Result<(), CoreError>;

    async fn hover(&self, params: HoverParams) -> Result<Option<Hover>, CoreError> {
        Err(CoreError::MethodNotImplemented("hover"))
    }
    async fn completion(
        &self,
        params: CompletionParams,
    ) -> Result<Option<CompletionResponse>, CoreError> {
        Err(CoreError::MethodNotImplemented("completion"))
    }
    async fn definition(
        &self,
        params: GotoDefinitionParams,
    ) -> Result<Option<GotoDefinitionResponse>, CoreError> {
        Err(CoreError::MethodNotImplemented("definition"))
    }
    async fn diagnostics(&self, uri: &Url) -> Result<Vec<Diagnostic>, CoreError> {
        Err(CoreError::MethodNotImplemented("diagnostics"))
    }
    async fn code_actions(
        &self,
        params: CodeActionParams,
    ) -> Result<Option<CodeActionResponse>, CoreError> {
        Err(CoreError::MethodNotImplemented("codeAction"))
    }
    async fn code_lens(&self, uri: &Url) -> Result<Option<Vec<CodeLens>>, CoreError> {
        Err(CoreError::MethodNotImplemented("codeLens"))
    }
    async fn inlay_hints(&self, uri: &Url, range: Range) -> Result<Option<Vec<InlayHint>>, CoreError> {
        Err(CoreError::MethodNotImplemented("inlayHint"))
    }
    async fn semantic_tokens_full(
        &self,
        uri: &Url,
    ) -> Result<Option<SemanticTokensResult>, CoreError> {
        Err(CoreError::MethodNotImplemented("semanticTokens/full"))
    }

    /// Local rename seed: produces edits covering at least the current file, plus a USR
    /// if the renamed symbol is one the index can track (spec §4.6 step 1).
    async fn rename(
        &self,
        uri: &Url,
        position: Position,
        new_name: &str,
    ) -> Result<RenameSeed, CoreError> {
        Err(CoreError::MethodNotImplemented("rename"))
    }

    async fn prepare_rename(
        &self,
        uri: &Url,
        position: Position,
    ) -> Result<Option<PrepareRenameResponse>, CoreError> {
        Err(CoreError::MethodNotImplemented("prepareRename"))
    }

    /// Converts index-sourced occurrences into edits for this backend's native syntax
    /// (spec §4.6 step 7).
    async fn edits_to_rename(
        &self,
        locations: &[SourceLocation],
        snapshot: &DocumentSnapshot,
        old_name: &str,
        new_name: &str,
    ) -> Result<Vec<TextEdit>, CoreError> {
        Err(CoreError::MethodNotImplemented("editsToRename"))
    }

    /// Applied for every `definition` classified location (spec §4.6 step 8).
    async fn edits_to_rename_parameters_in_function_body(
        &self,
        snapshot: &DocumentSnapshot,
        location: SourceLocation,
        new_name: &str,
    ) -> Result<Vec<TextEdit>, CoreError> {
        Ok(Vec::new())
    }

    /// Translates a clang-family name to this (AST-language) backend's native spelling.
    /// `is_selector` requests Objective-C selector interpretation for method symbols.
    async fn translate_to_ast_language(
        &self,
        location: SourceLocation,
        snapshot: &DocumentSnapshot,
        is_selector: bool,
        name: &str,
    ) -> Result<Option<String>, CoreError> {
        Err(CoreError::MethodNotImplemented("translateToAstLanguage"))
    }

    /// Translates an AST-language name to this (clang-family) backend's native spelling.
    async fn translate_to_clang_family(
        &self,
        location: SourceLocation,
        uri: &Url,
        name: &str,
    ) -> Result<Option<String>, CoreError> {
        Err(CoreError::MethodNotImplemented("translateToClangFamily"))
    }
}

/// Result of the local rename seed (spec §4.6 step 1).
pub struct RenameSeed {
    pub edits: std::collections::HashMap<Url, Vec<TextEdit>>,
    pub usr: Option<String>,
}

/// Fires when a backend transitions state; passed to `add_state_change_handler`. `'static`
/// because a backend may hold it for its entire lifetime (e.g. in a background connection
/// task), not just for the duration of one call.
pub type StateChangeHandler = Box<dyn Fn(BackendState) + Send + Sync + 'static>;
