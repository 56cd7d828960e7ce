//! `CapabilityRegistry`: per-workspace record of negotiated and dynamically registered
//! client capabilities (spec §4.2).

use rustc_hash::FxHashMap;
use parking_lot::Mutex;
use tower_lsp::lsp_types::Registration;
use tracing::warn;
use uuid::Uuid;

/// The capability kinds the registry deduplicates by method + language selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapabilityKind {
    Completion,
    SignatureHelp,
    FoldingRange,
    SemanticTokens,
    InlayHint,
    PullDiagnostics,
    WorkspaceFileWatching,
    ExecuteCommand,
}

impl CapabilityKind {
    fn method(self) -> &'static str {
        match self {
            CapabilityKind::Completion => "textDocument/completion",
            CapabilityKind::SignatureHelp => "textDocument/signatureHelp",
            CapabilityKind::FoldingRange => "textDocument/foldingRange",
            CapabilityKind::SemanticTokens => "textDocument/semanticTokens",
            CapabilityKind::InlayHint => "textDocument/inlayHint",
            CapabilityKind::PullDiagnostics => "textDocument/diagnostic",
            CapabilityKind::WorkspaceFileWatching => "workspace/didChangeWatchedFiles",
            CapabilityKind::ExecuteCommand => "workspace/executeCommand",
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    id: String,
    languages: Vec<String>,
    options: serde_json::Value,
}

/// One registry per workspace. `register` call sites decide whether the client declared
/// dynamic registration for the kind; the registry itself only tracks what has been sent.
#[derive(Default)]
pub struct CapabilityRegistry {
    entries: Mutex<FxHashMap<CapabilityKind, Vec<Entry>>>,
    command_ids: Mutex<std::collections::HashSet<String>>,
}

/// Outcome of a `register` call: whether the caller must actually send
/// `client/registerCapability`, and with what `Registration` if so.
pub enum RegisterOutcome {
    /// Nothing to send: an identical registration already covers these languages.
    AlreadyRegistered,
    /// A registration for these languages exists with different options; rejected.
    Conflict,
    /// Send this registration to the client.
    Send(Registration),
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Implements the shared register-X flow (spec §4.2 "Operations"). Synthesizes and
    /// records the registration id *before* returning `Send`, so a concurrent duplicate
    /// call observes the in-flight registration (blocks concurrent duplicate registrations).
    pub fn register(
        &self,
        kind: CapabilityKind,
        languages: Vec<String>,
        options: serde_json::Value,
    ) -> RegisterOutcome {
        let mut entries = self.entries.lock();
        let list = entries.entry(kind).or_default();

        if let Some(existing) = list
            .iter()
            .find(|entry| entry.languages.iter().any(|lang| languages.contains(lang)))
        {
            if existing.options == options {
                return RegisterOutcome::AlreadyRegistered;
            }
            warn!(method = kind.method(), "conflicting capability registration, rejected");
            return RegisterOutcome::Conflict;
        }

        let id = Uuid::new_v4().to_string();
        list.push(Entry {
            id: id.clone(),
            languages,
            options: options.clone(),
        });

        RegisterOutcome::Send(Registration {
            id,
            method: kind.method().to_string(),
            register_options: Some(options),
        })
    }

    /// Removes a registration record after the client rejected it or it was explicitly
    /// unregistered.
    pub fn remove(&self, kind: CapabilityKind, id: &str) {
        if let Some(list) = self.entries.lock().get_mut(&kind) {
            list.retain(|entry| entry.id != id);
        }
    }

    /// Execute-command has a simpler flow: only the delta over `command_ids` is sent,
    /// since VS Code-style clients forbid re-registering a known command id.
    pub fn new_execute_command_ids(&self, commands: &[String]) -> Vec<String> {
        let mut known = self.command_ids.lock();
        let delta: Vec<String> = commands
            .iter()
            .filter(|command| !known.contains(*command))
            .cloned()
            .collect();
        known.extend(delta.iter().cloned());
        delta
    }

    /// Number of live registrations recorded for `kind`, across all language selectors.
    pub fn registered_count(&self, kind: CapabilityKind) -> usize {
        self.entries.lock().get(&kind).map(Vec::len).unwrap_or(0)
    }

    /// File watching has a single active registration; the caller unregisters any
    /// previous one before calling `register` for the new set.
    pub fn file_watching_registration_id(&self) -> Option<String> {
        self.entries
            .lock()
            .get(&CapabilityKind::WorkspaceFileWatching)
            .and_then(|list| list.first())
            .map(|entry| entry.id.clone())
    }
}

/// Interprets an experimental client capability that may be reported as either `true` or
/// `{"supported": true}` (spec §4.2 "Client-side static facts").
pub fn experimental_capability_enabled(value: Option<&serde_json::Value>) -> bool {
    match value {
        Some(serde_json::Value::Bool(enabled)) => *enabled,
        Some(serde_json::Value::Object(map)) => map
            .get("supported")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false),
        _ => false,
    }
}
