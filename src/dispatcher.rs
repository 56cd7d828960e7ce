//! `Dispatcher`: the `tower_lsp::LanguageServer` implementation (spec §4.4). Ingress for
//! LSP messages; routes each to the owning workspace and backend, emits a per-request
//! logging scope, and converts `CoreError`s into LSP replies.
//!
//! Cancellation: `tower_lsp::LanguageServer`'s typed handler methods are never handed the
//! raw JSON-RPC id a `$/cancelRequest` notification names — none of the methods below take
//! one — so a literal id-keyed task-abort map (spec §9 "per-request id → task map") isn't
//! expressible at this layer; `tower-lsp` does not auto-cancel in-flight handlers on our
//! behalf either, the same wall the teacher hits in `state/mod.rs`, worked around there
//! with a monotonic ticket counter (`begin_semantic_request`/`semantic_request_cancelled`)
//! rather than a real `$/cancelRequest` handler. `CancellationRegistry` below generalizes
//! that ticket scheme per document: starting a new feature request for a URI supersedes
//! whichever older one is still in flight for it, which then resolves as
//! `CoreError::Cancelled` instead of a stale result. See `DESIGN.md` for the full decision.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::json;
use tokio::sync::mpsc;
use tower_lsp::jsonrpc::Result as RpcResult;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer};
use tracing::{info, warn};

use crate::build_system::BuildSystemManager;
use crate::capability::{CapabilityKind, CapabilityRegistry, RegisterOutcome};
use crate::document::DocumentManager;
use crate::error::CoreError;
use crate::index::SemanticIndex;
use crate::language_service::{family_for_uri, BackendState, LanguageFamily, LanguageService};
use crate::progress::{InitGate, SharedWorkDoneProgressManager};
use crate::rename::{cross_language_rename, LanguageServiceLookup, RenameRequest};
use crate::telemetry::request_scope;
use crate::test_index::{SyntacticTestIndex, TestItem};
use crate::workspace::{BuildRootProbe, FileHandling, Workspace, WorkspaceRouter};

/// File-watching glob patterns the core registers on behalf of the build system (spec §6
/// "File watching").
const WATCHED_FILE_GLOBS: &[&str] = &[
    "**/Package.swift",
    "**/compile_commands.json",
    "**/compile_flags.txt",
    "**/*.swiftmodule",
];

struct BuildSystemProbe(Arc<dyn BuildSystemManager>);

impl BuildRootProbe for BuildSystemProbe {
    fn file_handling(&self, workspace_root: Option<&Url>, uri: &Url) -> FileHandling {
        self.0.file_handling(workspace_root, uri)
    }

    fn can_adopt(&self, dir: &Url) -> bool {
        self.0.can_adopt(dir)
    }
}

/// Cooperative per-document cancellation standing in for the literal "request id → task"
/// map spec §9 sketches; see the module doc for why that map isn't expressible against
/// `tower_lsp::LanguageServer`'s typed methods. A ticket is stale the moment a newer
/// request for the same URI begins.
#[derive(Default)]
struct CancellationRegistry {
    generation: Mutex<FxHashMap<Url, u64>>,
}

impl CancellationRegistry {
    fn begin(&self, uri: &Url) -> u64 {
        let mut map = self.generation.lock();
        let ticket = map.get(uri).copied().unwrap_or(0) + 1;
        map.insert(uri.clone(), ticket);
        ticket
    }

    fn is_current(&self, uri: &Url, ticket: u64) -> bool {
        self.generation.lock().get(uri).copied() == Some(ticket)
    }
}

struct ServiceRegistry {
    by_family: FxHashMap<LanguageFamily, Arc<dyn LanguageService>>,
}

impl LanguageServiceLookup for ServiceRegistry {
    fn service_for(&self, family: LanguageFamily) -> Option<Arc<dyn LanguageService>> {
        self.by_family.get(&family).cloned()
    }

    fn service_for_uri(&self, uri: &Url) -> Option<Arc<dyn LanguageService>> {
        self.service_for(family_for_uri(uri))
    }
}

/// The core's single `LanguageServer` implementation, generic over a backend wiring
/// supplied at construction time.
pub struct Dispatcher {
    client: Client,
    documents: Arc<DocumentManager>,
    router: WorkspaceRouter,
    build_system: Arc<dyn BuildSystemManager>,
    services: ServiceRegistry,
    index: Option<Arc<dyn SemanticIndex>>,
    test_index: SyntacticTestIndex,
    init_gate: Arc<InitGate>,
    backend_request_timeout: std::time::Duration,
    cancellation: CancellationRegistry,
    /// Whether the client declared dynamic registration for `textDocument/completion`
    /// (spec §4.2 scenario 4); set from `initialize`'s `ClientCapabilities`.
    dynamic_completion_registration: AtomicBool,
}

impl Dispatcher {
    pub fn new(
        client: Client,
        build_system: Arc<dyn BuildSystemManager>,
        services: Vec<(LanguageFamily, Arc<dyn LanguageService>)>,
        index: Option<Arc<dyn SemanticIndex>>,
        backend_request_timeout: std::time::Duration,
    ) -> Self {
        let documents = Arc::new(DocumentManager::new());
        let init_gate = InitGate::new();
        let by_family: FxHashMap<LanguageFamily, Arc<dyn LanguageService>> =
            services.into_iter().collect();

        let (state_tx, state_rx) = mpsc::unbounded_channel::<(LanguageFamily, BackendState)>();
        for (family, service) in &by_family {
            let family = *family;
            let tx = state_tx.clone();
            service.add_state_change_handler(Box::new(move |state| {
                let _ = tx.send((family, state));
            }));
        }
        spawn_backend_state_reconciler(
            state_rx,
            client.clone(),
            documents.clone(),
            by_family.clone(),
            init_gate.clone(),
        );

        Self {
            client,
            documents,
            router: WorkspaceRouter::new(),
            build_system,
            services: ServiceRegistry { by_family },
            index,
            test_index: SyntacticTestIndex::new(),
            init_gate,
            backend_request_timeout,
            cancellation: CancellationRegistry::default(),
            dynamic_completion_registration: AtomicBool::new(false),
        }
    }

    fn probe(&self) -> BuildSystemProbe {
        BuildSystemProbe(self.build_system.clone())
    }

    /// Every workspace currently known to the router, explicit or implicitly created.
    pub fn workspaces(&self) -> Vec<Arc<Workspace>> {
        self.router.workspaces()
    }

    async fn owning_workspace_and_service(
        &self,
        uri: &Url,
    ) -> Option<(Arc<Workspace>, Arc<dyn LanguageService>)> {
        let workspace = self.router.resolve(uri, &self.probe())?;
        let service = self.services.service_for_uri(uri)?;
        Some((workspace, service))
    }

    async fn owning_service_for_uri(&self, uri: &Url) -> Option<Arc<dyn LanguageService>> {
        self.owning_workspace_and_service(uri).await.map(|(_, service)| service)
    }

    /// The `backendRequestTimeout` backends are expected to honor themselves when this
    /// core forwards a request; the core never enforces a timeout on their behalf (spec
    /// §7 "Timeouts", preserved per `DESIGN.md` Open Question 1).
    pub fn backend_request_timeout(&self) -> std::time::Duration {
        self.backend_request_timeout
    }

    /// Runs a single backend call under the cooperative cancellation ticket for `uri`
    /// (module doc). If a newer request for the same URI started while `fut` was in
    /// flight, the result is discarded and `CoreError::Cancelled` is returned instead.
    async fn call_backend<T>(
        &self,
        uri: &Url,
        fut: impl std::future::Future<Output = Result<T, CoreError>>,
    ) -> Result<T, CoreError> {
        let ticket = self.cancellation.begin(uri);
        let result = fut.await;
        if !self.cancellation.is_current(uri, ticket) {
            return Err(CoreError::Cancelled);
        }
        result
    }
}

/// Reacts to backend state transitions (spec §4.5 state machine). Runs for the lifetime of
/// the `Dispatcher` that spawned it; owns cloned handles instead of `&Dispatcher` so it can
/// outlive any single request.
///
/// On `connectionInterrupted` it starts a shared outage notice (first entrant only,
/// ended the moment any backend returns to `connected` — spec §4.5 "the shared progress
/// manager ... started on the first transition into connectionInterrupted and ended when
/// any backend returns to connected"). On `semanticFunctionalityDisabled` it marks the
/// family's open documents pending reopen; the reopen itself runs once that family reaches
/// `connected` again, since that's the earliest point the backend can actually accept it.
fn spawn_backend_state_reconciler(
    mut state_rx: mpsc::UnboundedReceiver<(LanguageFamily, BackendState)>,
    client: Client,
    documents: Arc<DocumentManager>,
    services: FxHashMap<LanguageFamily, Arc<dyn LanguageService>>,
    init_gate: Arc<InitGate>,
) {
    tokio::spawn(async move {
        let progress = SharedWorkDoneProgressManager::new(
            client,
            init_gate,
            "backend connection interrupted",
        );
        let mut pending_reopen: FxHashSet<LanguageFamily> = FxHashSet::default();

        while let Some((family, state)) = state_rx.recv().await {
            match state {
                BackendState::ConnectionInterrupted => {
                    progress.start(Some(format!("{family:?} connection interrupted"))).await;
                }
                BackendState::SemanticFunctionalityDisabled => {
                    pending_reopen.insert(family);
                }
                BackendState::Connected => {
                    progress.end();
                    if !pending_reopen.remove(&family) {
                        continue;
                    }
                    let Some(service) = services.get(&family) else {
                        continue;
                    };
                    for uri in documents.open_documents() {
                        if family_for_uri(&uri) != family {
                            continue;
                        }
                        if let Ok(snapshot) = documents.latest_snapshot(&uri) {
                            if let Err(err) = service.reopen_document(&snapshot).await {
                                warn!(%err, %uri, "backend rejected post-recovery reopen");
                            }
                        }
                    }
                }
            }
        }
    });
}

#[tower_lsp::async_trait]
impl LanguageServer for Dispatcher {
    async fn initialize(&self, params: InitializeParams) -> RpcResult<InitializeResult> {
        let _scope = request_scope("initialize", None).entered();
        info!("initializing");

        let mut workspace_folders = Vec::new();
        if let Some(folders) = params.workspace_folders {
            workspace_folders.extend(folders.into_iter().map(|folder| folder.uri));
        } else if let Some(root_uri) = params.root_uri {
            workspace_folders.push(root_uri);
        }
        for root in workspace_folders {
            self.router.add_explicit(root);
        }

        let dynamic_completion = params
            .capabilities
            .text_document
            .as_ref()
            .and_then(|td| td.completion.as_ref())
            .and_then(|completion| completion.dynamic_registration)
            .unwrap_or(false);
        self.dynamic_completion_registration
            .store(dynamic_completion, Ordering::Relaxed);

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Options(
                    TextDocumentSyncOptions {
                        open_close: Some(true),
                        change: Some(TextDocumentSyncKind::INCREMENTAL),
                        save: Some(TextDocumentSyncSaveOptions::SaveOptions(SaveOptions {
                            include_text: Some(true),
                        })),
                        ..Default::default()
                    },
                )),
                hover_provider: Some(HoverProviderCapability::Simple(true)),
                completion_provider: Some(CompletionOptions {
                    resolve_provider: Some(false),
                    ..Default::default()
                }),
                definition_provider: Some(OneOf::Left(true)),
                references_provider: Some(OneOf::Left(true)),
                code_action_provider: Some(CodeActionProviderCapability::Simple(true)),
                code_lens_provider: Some(CodeLensOptions {
                    resolve_provider: Some(false),
                }),
                rename_provider: Some(OneOf::Right(RenameOptions {
                    prepare_provider: Some(true),
                    work_done_progress_options: Default::default(),
                })),
                semantic_tokens_provider: Some(
                    SemanticTokensServerCapabilities::SemanticTokensOptions(
                        SemanticTokensOptions {
                            legend: SemanticTokensLegend {
                                token_types: vec![SemanticTokenType::VARIABLE],
                                token_modifiers: vec![],
                            },
                            full: Some(SemanticTokensFullOptions::Bool(true)),
                            ..Default::default()
                        },
                    ),
                ),
                inlay_hint_provider: Some(OneOf::Right(InlayHintServerCapabilities::Options(
                    InlayHintOptions {
                        resolve_provider: Some(false),
                        work_done_progress_options: Default::default(),
                    },
                ))),
                diagnostic_provider: Some(DiagnosticServerCapabilities::Options(
                    DiagnosticOptions {
                        identifier: Some("lsp-core".to_string()),
                        inter_file_dependencies: true,
                        workspace_diagnostics: false,
                        work_done_progress_options: Default::default(),
                    },
                )),
                workspace: Some(WorkspaceServerCapabilities {
                    workspace_folders: Some(WorkspaceFoldersServerCapabilities {
                        supported: Some(true),
                        change_notifications: Some(OneOf::Left(true)),
                    }),
                    file_operations: Some(WorkspaceFileOperationsServerCapabilities {
                        will_rename: Some(FileOperationRegistrationOptions { filters: vec![] }),
                        ..Default::default()
                    }),
                }),
                // Both methods are registered as custom methods in `main.rs` via
                // `LspService::build(...).custom_method(...)`, backed by `test_index`
                // (`Dispatcher::workspace_tests`/`document_tests`).
                experimental: Some(json!({
                    "workspace/tests": {"version": 2},
                    "textDocument/tests": {"version": 2},
                })),
                ..Default::default()
            },
            server_info: Some(ServerInfo {
                name: "lsp-core".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _params: InitializedParams) {
        self.init_gate.mark_ready();
        let registration = Registration {
            id: uuid::Uuid::new_v4().to_string(),
            method: "workspace/didChangeWatchedFiles".to_string(),
            register_options: Some(json!({
                "watchers": WATCHED_FILE_GLOBS
                    .iter()
                    .map(|glob| json!({ "globPattern": glob }))
                    .collect::<Vec<_>>()
            })),
        };
        if let Err(err) = self.client.register_capability(vec![registration]).await {
            warn!(%err, "client rejected file-watcher registration");
        }
        info!("initialized");
    }

    async fn shutdown(&self) -> RpcResult<()> {
        let _scope = request_scope("shutdown", None).entered();
        for service in self.services.by_family.values() {
            let _ = service.shutdown().await;
        }
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let _scope = request_scope("textDocument/didOpen", None).entered();
        let doc = params.text_document;
        match self
            .documents
            .open(doc.uri.clone(), doc.language_id.clone(), doc.version, doc.text)
        {
            Ok(snapshot) => {
                if let Some((workspace, service)) =
                    self.owning_workspace_and_service(&doc.uri).await
                {
                    if self.dynamic_completion_registration.load(Ordering::Relaxed) {
                        register_completion_if_new(
                            &self.client,
                            &workspace.capabilities,
                            &doc.language_id,
                        )
                        .await;
                    }
                    if let Err(err) = service.open_document(&snapshot).await {
                        warn!(%err, uri = %doc.uri, "backend rejected didOpen");
                    }
                }
            }
            Err(err) => warn!(%err, uri = %doc.uri, "didOpen on an already-open document"),
        }
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let _scope = request_scope("textDocument/didChange", None).entered();
        let uri = params.text_document.uri.clone();
        match self
            .documents
            .edit(&uri, params.text_document.version, params.content_changes)
        {
            Ok((pre, post, edits)) => {
                if let Some(service) = self.owning_service_for_uri(&uri).await {
                    if let Err(err) = service.change_document(&pre, &post, &edits).await {
                        warn!(%err, %uri, "backend rejected didChange");
                    }
                }
            }
            Err(err) => warn!(%err, %uri, "didChange on an unknown document"),
        }
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        let _scope = request_scope("textDocument/didSave", None).entered();
        let _ = params;
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let _scope = request_scope("textDocument/didClose", None).entered();
        let uri = params.text_document.uri;
        if let Err(err) = self.documents.close(&uri) {
            warn!(%err, %uri, "didClose on an unknown document");
            return;
        }
        if let Some(service) = self.owning_service_for_uri(&uri).await {
            let _ = service.close_document(&uri).await;
        }
    }

    async fn did_change_configuration(&self, params: DidChangeConfigurationParams) {
        let _scope = request_scope("workspace/didChangeConfiguration", None).entered();
        let _ = params;
    }

    async fn did_change_watched_files(&self, params: DidChangeWatchedFilesParams) {
        let _scope = request_scope("workspace/didChangeWatchedFiles", None).entered();
        self.build_system
            .dependencies_changed(&params.changes.iter().map(|c| c.uri.clone()).collect::<Vec<_>>())
            .await;
        for change in &params.changes {
            if let Some(service) = self.services.service_for_uri(&change.uri) {
                if let Err(err) = service.document_updated_build_settings(&change.uri).await {
                    warn!(%err, uri = %change.uri, "backend rejected build settings update");
                }
            }
        }
    }

    async fn did_change_workspace_folders(&self, params: DidChangeWorkspaceFoldersParams) {
        let _scope = request_scope("workspace/didChangeWorkspaceFolders", None).entered();
        let added: Vec<Url> = params.event.added.into_iter().map(|f| f.uri).collect();
        let removed: Vec<Url> = params.event.removed.into_iter().map(|f| f.uri).collect();
        let open_documents = self.documents.open_documents();
        let probe = self.probe();
        let changes = self
            .router
            .apply_folder_change(added, removed, &open_documents, &probe);
        for (uri, old, new) in changes {
            if let Some(old_workspace) = &old {
                old_workspace.unassign_document(&uri);
            }
            if let Some(new_workspace) = &new {
                new_workspace.assign_document(uri.clone(), "default".to_string());
                if let Some(service) = self.owning_service_for_uri(&uri).await {
                    if let Ok(snapshot) = self.documents.latest_snapshot(&uri) {
                        let _ = service.reopen_document(&snapshot).await;
                    }
                }
            }
        }
    }

    async fn will_rename_files(&self, _params: RenameFilesParams) -> RpcResult<Option<WorkspaceEdit>> {
        Ok(None)
    }

    async fn hover(&self, params: HoverParams) -> RpcResult<Option<Hover>> {
        let uri = params.text_document_position_params.text_document.uri.clone();
        let _scope = request_scope("textDocument/hover", None).entered();
        let Some(service) = self.owning_service_for_uri(&uri).await else {
            return Ok(None);
        };
        match self.call_backend(&uri, service.hover(params)).await {
            Ok(hover) => Ok(hover),
            Err(CoreError::MethodNotImplemented(_)) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn completion(&self, params: CompletionParams) -> RpcResult<Option<CompletionResponse>> {
        let uri = params.text_document_position.text_document.uri.clone();
        let _scope = request_scope("textDocument/completion", None).entered();
        let Some(service) = self.owning_service_for_uri(&uri).await else {
            return Ok(None);
        };
        match self.call_backend(&uri, service.completion(params)).await {
            Ok(completion) => Ok(completion),
            Err(CoreError::MethodNotImplemented(_)) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn goto_definition(
        &self,
        params: GotoDefinitionParams,
    ) -> RpcResult<Option<GotoDefinitionResponse>> {
        let uri = params.text_document_position_params.text_document.uri.clone();
        let _scope = request_scope("textDocument/definition", None).entered();
        let Some(service) = self.owning_service_for_uri(&uri).await else {
            return Ok(None);
        };
        match self.call_backend(&uri, service.definition(params)).await {
            Ok(location) => Ok(location),
            Err(CoreError::MethodNotImplemented(_)) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn rename(&self, params: RenameParams) -> RpcResult<Option<WorkspaceEdit>> {
        let uri = params.text_document_position.text_document.uri.clone();
        let position = params.text_document_position.position;
        let _scope = request_scope("textDocument/rename", None).entered();

        let index = self.index.as_deref();
        let request = RenameRequest {
            uri,
            position,
            new_name: params.new_name,
            index,
            services: &self.services,
            documents: &self.documents,
        };
        match cross_language_rename(request).await {
            Ok(changes) => Ok(Some(WorkspaceEdit {
                changes: Some(changes),
                ..Default::default()
            })),
            Err(err) => {
                if err.is_fault() {
                    warn!(%err, "rename failed");
                }
                Err(err.into())
            }
        }
    }

    async fn prepare_rename(
        &self,
        params: TextDocumentPositionParams,
    ) -> RpcResult<Option<PrepareRenameResponse>> {
        let _scope = request_scope("textDocument/prepareRename", None).entered();
        let Some(service) = self.owning_service_for_uri(&params.text_document.uri).await else {
            return Ok(None);
        };
        match self
            .call_backend(&params.text_document.uri, service.prepare_rename(&params.text_document.uri, params.position))
            .await
        {
            Ok(response) => Ok(response),
            Err(CoreError::MethodNotImplemented(_)) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn code_action(&self, params: CodeActionParams) -> RpcResult<Option<CodeActionResponse>> {
        let uri = params.text_document.uri.clone();
        let _scope = request_scope("textDocument/codeAction", None).entered();
        let Some(service) = self.owning_service_for_uri(&uri).await else {
            return Ok(None);
        };
        match self.call_backend(&uri, service.code_actions(params)).await {
            Ok(actions) => Ok(actions),
            Err(CoreError::MethodNotImplemented(_)) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn semantic_tokens_full(
        &self,
        params: SemanticTokensParams,
    ) -> RpcResult<Option<SemanticTokensResult>> {
        let uri = params.text_document.uri.clone();
        let _scope = request_scope("textDocument/semanticTokens/full", None).entered();
        let Some(service) = self.owning_service_for_uri(&uri).await else {
            return Ok(None);
        };
        match self.call_backend(&uri, service.semantic_tokens_full(&uri)).await {
            Ok(tokens) => Ok(tokens),
            Err(CoreError::MethodNotImplemented(_)) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn diagnostic(
        &self,
        params: DocumentDiagnosticParams,
    ) -> RpcResult<DocumentDiagnosticReportResult> {
        let uri = params.text_document.uri.clone();
        let _scope = request_scope("textDocument/diagnostic", None).entered();
        let items = match self.owning_service_for_uri(&uri).await {
            Some(service) => match self.call_backend(&uri, service.diagnostics(&uri)).await {
                Ok(items) => items,
                Err(CoreError::Cancelled) => return Err(CoreError::Cancelled.into()),
                Err(err) => {
                    warn!(%err, %uri, "diagnostic retrieval failed, returning empty report");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };
        Ok(DocumentDiagnosticReportResult::Report(
            DocumentDiagnosticReport::Full(RelatedFullDocumentDiagnosticReport {
                related_documents: None,
                full_document_diagnostic_report: FullDocumentDiagnosticReport {
                    result_id: None,
                    items,
                },
            }),
        ))
    }
}

impl Dispatcher {
    /// Backs the custom `workspace/tests` method advertised in `initialize`'s `experimental`
    /// capabilities (spec §4.7). Registered via `LspService::build(...).custom_method(...)`
    /// in `main.rs` rather than `tower_lsp::LanguageServer`, which has no such method.
    pub async fn workspace_tests(&self, _params: ()) -> RpcResult<Vec<TestItem>> {
        Ok(self
            .test_index
            .read()
            .into_iter()
            .flat_map(|(_, items)| items)
            .collect())
    }

    /// Backs the custom `textDocument/tests` method (spec §4.7).
    pub async fn document_tests(&self, params: TextDocumentIdentifier) -> RpcResult<Vec<TestItem>> {
        Ok(self.test_index.read_document(&params.uri))
    }

    /// Exposes the syntactic test index so an embedder can drive `initial_population`/
    /// `reindex` with its own `TestScanner` (spec §4.7 "The scanner is backend-specific and
    /// injected"); this core never scans files on its own.
    pub fn test_index(&self) -> &SyntacticTestIndex {
        &self.test_index
    }
}

/// Registers dynamic completion support for a workspace the first time it opens a
/// document in a given language, deduplicating via `CapabilityRegistry` (spec §4.2,
/// scenario 4 in §8). Called from `did_open` whenever the client declared dynamic
/// completion registration in `initialize`.
pub async fn register_completion_if_new(
    client: &Client,
    registry: &CapabilityRegistry,
    language: &str,
) {
    let outcome = registry.register(
        CapabilityKind::Completion,
        vec![language.to_string()],
        json!({ "documentSelector": [{ "language": language }] }),
    );
    if let RegisterOutcome::Send(registration) = outcome {
        if let Err(err) = client.register_capability(vec![registration]).await {
            warn!(%err, "client rejected completion registration");
        }
    }
}
