//! `Workspace` and `WorkspaceRouter` (spec §4.3): URI → owning workspace resolution,
//! implicit workspace creation, and folder-change handling.

use std::sync::Arc;

use parking_lot::RwLock;
use percent_encoding::percent_decode_str;
use rustc_hash::FxHashMap;
use tower_lsp::lsp_types::Url;
use tracing::warn;

use crate::capability::CapabilityRegistry;

/// Ordered file-handling capability a workspace's build system reports for a URI.
/// `Unhandled < Fallback < Handled`; the router picks the highest, ties broken by list
/// order (spec §4.3 step 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FileHandling {
    Unhandled,
    Fallback,
    Handled,
}

/// A single opened or implicitly-created workspace.
pub struct Workspace {
    pub root: Option<Url>,
    pub is_implicit: bool,
    pub capabilities: CapabilityRegistry,
    /// Language service instance id serving each open document in this workspace.
    document_services: RwLock<FxHashMap<Url, String>>,
}

impl Workspace {
    pub fn new(root: Option<Url>, is_implicit: bool) -> Self {
        Self {
            root,
            is_implicit,
            capabilities: CapabilityRegistry::new(),
            document_services: RwLock::new(FxHashMap::default()),
        }
    }

    pub fn assign_document(&self, uri: Url, service_id: String) {
        self.document_services.write().insert(uri, service_id);
    }

    pub fn unassign_document(&self, uri: &Url) {
        self.document_services.write().remove(uri);
    }

    pub fn owns_document(&self, uri: &Url) -> bool {
        self.document_services.read().contains_key(uri)
    }
}

/// A probe the router uses to test whether a directory can host an implicit workspace,
/// and to rank existing workspaces' ability to serve a URI. Implemented per backend; the
/// router only defines the selection algorithm.
pub trait BuildRootProbe: Send + Sync {
    fn file_handling(&self, workspace_root: Option<&Url>, uri: &Url) -> FileHandling;
    /// Returns true if `dir` looks like a root the probe's build system can adopt.
    fn can_adopt(&self, dir: &Url) -> bool;
}

struct CachedEntry {
    workspace: Arc<Workspace>,
}

/// Resolves the workspace owning a URI, creating implicit workspaces on demand. All
/// mutation happens under a single lock, modeling the "serialized workspace queue" from
/// spec §4.3.
pub struct WorkspaceRouter {
    workspaces: RwLock<Vec<Arc<Workspace>>>,
    cache: RwLock<FxHashMap<Url, CachedEntry>>,
}

impl Default for WorkspaceRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkspaceRouter {
    pub fn new() -> Self {
        Self {
            workspaces: RwLock::new(Vec::new()),
            cache: RwLock::new(FxHashMap::default()),
        }
    }

    pub fn workspaces(&self) -> Vec<Arc<Workspace>> {
        self.workspaces.read().clone()
    }

    pub fn add_explicit(&self, root: Url) -> Arc<Workspace> {
        let workspace = Arc::new(Workspace::new(Some(root), false));
        self.workspaces.write().push(workspace.clone());
        workspace
    }

    /// Resolves the workspace for `uri`, following spec §4.3's four-step selection rule.
    pub fn resolve(&self, uri: &Url, probe: &dyn BuildRootProbe) -> Option<Arc<Workspace>> {
        if let Some(cached) = self.cache.read().get(uri) {
            return Some(cached.workspace.clone());
        }

        let workspaces = self.workspaces.read().clone();
        let mut best: Option<(FileHandling, Arc<Workspace>)> = None;
        for workspace in &workspaces {
            let handling = probe.file_handling(workspace.root.as_ref(), uri);
            if best
                .as_ref()
                .is_none_or(|(best_handling, _)| handling > *best_handling)
            {
                best = Some((handling, workspace.clone()));
            }
        }

        if let Some((FileHandling::Handled, workspace)) = &best {
            self.cache_uri(uri.clone(), workspace.clone());
            return Some(workspace.clone());
        }

        if let Some(implicit) = self.try_create_implicit(uri, probe) {
            self.cache_uri(uri.clone(), implicit.clone());
            return Some(implicit);
        }

        if workspaces.len() == 1 {
            let only = workspaces.into_iter().next().unwrap();
            self.cache_uri(uri.clone(), only.clone());
            return Some(only);
        }

        None
    }

    fn cache_uri(&self, uri: Url, workspace: Arc<Workspace>) {
        self.cache.write().insert(uri, CachedEntry { workspace });
    }

    /// Walks parent directories of `uri`, bounded by declared workspace roots, looking for
    /// one the probe's build system can adopt (spec §4.3 step 3).
    fn try_create_implicit(&self, uri: &Url, probe: &dyn BuildRootProbe) -> Option<Arc<Workspace>> {
        let path = uri_to_path(uri)?;
        let roots: Vec<_> = self
            .workspaces
            .read()
            .iter()
            .filter_map(|workspace| workspace.root.clone())
            .collect();

        let mut dir = path.parent()?.to_path_buf();
        loop {
            if let Some(dir_url) = path_to_uri(&dir) {
                if probe.can_adopt(&dir_url) {
                    let workspace = Arc::new(Workspace::new(Some(dir_url), true));
                    self.workspaces.write().push(workspace.clone());
                    return Some(workspace);
                }
            }

            let is_bounded = roots.iter().any(|root| {
                uri_to_path(root).map(|p| p == dir).unwrap_or(false)
            });
            if is_bounded {
                return None;
            }
            match dir.parent() {
                Some(parent) => dir = parent.to_path_buf(),
                None => return None,
            }
        }
    }

    /// Handles `workspace/didChange`: drops removed and all implicit workspaces, creates
    /// workspaces for additions, and returns the set of open documents whose owning
    /// workspace changed so the caller can synthesize close/open pairs (spec §4.3).
    pub fn apply_folder_change(
        &self,
        added: Vec<Url>,
        removed: Vec<Url>,
        open_documents: &[Url],
        probe: &dyn BuildRootProbe,
    ) -> Vec<(Url, Option<Arc<Workspace>>, Option<Arc<Workspace>>)> {
        let before: FxHashMap<Url, Option<Arc<Workspace>>> = open_documents
            .iter()
            .map(|uri| (uri.clone(), self.resolve(uri, probe)))
            .collect();

        {
            let mut workspaces = self.workspaces.write();
            workspaces.retain(|workspace| {
                let is_removed = workspace
                    .root
                    .as_ref()
                    .is_some_and(|root| removed.contains(root));
                !is_removed && !workspace.is_implicit
            });
            for root in added {
                workspaces.push(Arc::new(Workspace::new(Some(root), false)));
            }
        }
        self.cache.write().clear();

        open_documents
            .iter()
            .filter_map(|uri| {
                let old = before.get(uri).cloned().flatten();
                let new = self.resolve(uri, probe);
                let changed = match (&old, &new) {
                    (Some(a), Some(b)) => !Arc::ptr_eq(a, b),
                    (None, None) => false,
                    _ => true,
                };
                changed.then(|| (uri.clone(), old, new))
            })
            .collect()
    }
}

pub(crate) fn uri_to_path(uri: &Url) -> Option<std::path::PathBuf> {
    if let Ok(path) = uri.to_file_path() {
        return Some(path);
    }
    if uri.scheme() == "file" {
        let decoded = percent_decode_str(uri.path()).decode_utf8_lossy();
        return Some(std::path::PathBuf::from(decoded.as_ref()));
    }
    None
}

pub(crate) fn path_to_uri(path: &std::path::Path) -> Option<Url> {
    if let Ok(url) = Url::from_file_path(path) {
        return Some(url);
    }
    let raw = path.to_string_lossy();
    if !raw.starts_with('/') {
        return None;
    }
    Url::parse(&format!("file://{raw}")).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysHandled;
    impl BuildRootProbe for AlwaysHandled {
        fn file_handling(&self, workspace_root: Option<&Url>, uri: &Url) -> FileHandling {
            match workspace_root {
                Some(root) if uri.as_str().starts_with(root.as_str()) => FileHandling::Handled,
                _ => FileHandling::Unhandled,
            }
        }
        fn can_adopt(&self, _dir: &Url) -> bool {
            true
        }
    }

    struct NeverAdopts;
    impl BuildRootProbe for NeverAdopts {
        fn file_handling(&self, _workspace_root: Option<&Url>, _uri: &Url) -> FileHandling {
            FileHandling::Unhandled
        }
        fn can_adopt(&self, _dir: &Url) -> bool {
            false
        }
    }

    #[test]
    fn resolves_to_the_declared_root() {
        let router = WorkspaceRouter::new();
        let root = Url::parse("file:///project/a/").unwrap();
        router.add_explicit(root.clone());
        let uri = Url::parse("file:///project/a/src/x.swift").unwrap();
        let resolved = router.resolve(&uri, &AlwaysHandled).unwrap();
        assert_eq!(resolved.root, Some(root));
    }

    #[test]
    fn single_workspace_fallback_routes_unmatched_files() {
        let router = WorkspaceRouter::new();
        let root = Url::parse("file:///project/a/").unwrap();
        router.add_explicit(root.clone());
        let uri = Url::parse("file:///elsewhere/x.swift").unwrap();
        let resolved = router.resolve(&uri, &NeverAdopts).unwrap();
        assert_eq!(resolved.root, Some(root));
    }

    #[test]
    fn no_workspace_and_unadoptable_file_resolves_to_none() {
        let router = WorkspaceRouter::new();
        let uri = Url::parse("file:///elsewhere/x.swift").unwrap();
        assert!(router.resolve(&uri, &NeverAdopts).is_none());
    }
}
