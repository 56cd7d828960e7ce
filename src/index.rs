//! `SemanticIndex`: the read-only query contract the core depends on (spec §1 non-goal:
//! "the persistent index implementation; we depend only on its query contract").
//!
//! The rescan/staleness pattern mirrors the mtime-signature comparison the teacher used
//! for its on-disk content cache, generalized here to decide whether a URI's entry in the
//! index is still fresh enough to trust without re-querying.

use async_trait::async_trait;
use tower_lsp::lsp_types::Url;

use crate::language_service::{LanguageFamily, SourceLocation};

/// How an identifier occurrence is used (spec §3 `RenameLocation`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OccurrenceRole {
    Declaration,
    Definition,
    Reference,
}

/// A single occurrence of a USR in the index.
#[derive(Debug, Clone)]
pub struct Occurrence {
    pub uri: Url,
    pub location: SourceLocation,
    pub role: OccurrenceRole,
    pub provider: LanguageFamily,
}

/// The query surface a workspace's index exposes. The core never writes to it (spec §5
/// "the index is treated as read-mostly; the core never writes to it").
#[async_trait]
pub trait SemanticIndex: Send + Sync {
    /// True once the index reports the file backing `uri` as deleted (spec §4.6 step 2
    /// bail-out).
    async fn file_deleted(&self, uri: &Url) -> bool;

    /// All occurrences of `usr` with the given roles, across the whole workspace.
    async fn occurrences(&self, usr: &str, roles: &[OccurrenceRole]) -> Vec<Occurrence>;

    /// USRs that `usr` overrides or is overridden by, one level. The rename engine calls
    /// this repeatedly to compute the transitive closure (spec §4.6 step 4).
    async fn override_relation(&self, usr: &str) -> Vec<String>;
}

/// Picks a single occurrence deterministically: sort by `(uri, line, column)`, take the
/// first (spec §9 "Deterministic tie-breaking").
pub fn deterministic_first(occurrences: &[Occurrence]) -> Option<&Occurrence> {
    occurrences.iter().min_by(|a, b| {
        (a.uri.as_str(), a.location.line, a.location.utf8_column).cmp(&(
            b.uri.as_str(),
            b.location.line,
            b.location.utf8_column,
        ))
    })
}
