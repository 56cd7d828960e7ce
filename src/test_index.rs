//! Syntactic test-item index (spec §4.7): an in-memory, out-of-date-aware index of test
//! symbols that does not require the semantic index to be current.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use tokio::sync::{Mutex, Notify};
use tower_lsp::lsp_types::{Range, Url};

/// `{id, label, location, children, tags}`; `id` is joined from ancestor symbol names with
/// `/` (spec §3 `TestItem`). `Serialize` so it can be returned directly from the
/// `textDocument/tests`/`workspace/tests` custom LSP methods (spec §4.7).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestItem {
    pub id: String,
    pub label: String,
    pub location: Range,
    pub children: Vec<TestItem>,
    pub tags: Vec<String>,
}

impl TestItem {
    pub fn child_id(parent_id: &str, name: &str) -> String {
        if parent_id.is_empty() {
            name.to_string()
        } else {
            format!("{parent_id}/{name}")
        }
    }
}

/// The backend-specific scanner the core invokes; it only defines the task shape and
/// ordering (spec §4.7 "The scanner is backend-specific and injected").
#[async_trait]
pub trait TestScanner: Send + Sync {
    async fn scan(&self, uri: &Url, content: &str) -> Vec<TestItem>;
}

struct FileEntry {
    items: Vec<TestItem>,
    source_mtime: u64,
}

/// A document supplied to the index for (re)scanning.
pub struct ScanInput {
    pub uri: Url,
    pub content: String,
    pub source_mtime: u64,
}

#[derive(Default)]
pub struct SyntacticTestIndex {
    entries: RwLock<FxHashMap<Url, FileEntry>>,
    removed: RwLock<FxHashSet<Url>>,
    populated: std::sync::atomic::AtomicBool,
    in_progress: Mutex<FxHashSet<Url>>,
    in_progress_changed: Notify,
    batch_sequence: AtomicU64,
}

impl SyntacticTestIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// `initialPopulation`: runs exactly once, scanning every input before returning.
    /// Callers are expected to serialize this ahead of any `reindex`/`read` call; the
    /// `populated` flag makes a second call a no-op rather than a silent re-scan.
    pub async fn initial_population(&self, scanner: &dyn TestScanner, inputs: Vec<ScanInput>) {
        if self.populated.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut entries = FxHashMap::default();
        for input in inputs {
            let items = scanner.scan(&input.uri, &input.content).await;
            entries.insert(
                input.uri,
                FileEntry {
                    items,
                    source_mtime: input.source_mtime,
                },
            );
        }
        *self.entries.write() = entries;
    }

    /// `index(set-of-uris)`: conflicts with another `index` task only when the URI sets
    /// intersect; non-overlapping batches may run concurrently. Only rescans a URI whose
    /// `source_mtime` is newer than the recorded one (spec §4.7 "Rescan policy").
    pub async fn reindex(&self, scanner: &dyn TestScanner, inputs: Vec<ScanInput>) {
        let uris: FxHashSet<Url> = inputs.iter().map(|input| input.uri.clone()).collect();
        self.acquire(&uris).await;

        let mut fresh = Vec::new();
        for input in inputs {
            let needs_scan = self
                .entries
                .read()
                .get(&input.uri)
                .map(|entry| input.source_mtime > entry.source_mtime)
                .unwrap_or(true);
            if !needs_scan {
                continue;
            }
            let items = scanner.scan(&input.uri, &input.content).await;
            fresh.push((input.uri, items, input.source_mtime));
        }

        {
            let mut entries = self.entries.write();
            let mut removed = self.removed.write();
            for (uri, items, source_mtime) in fresh {
                if removed.contains(&uri) {
                    continue;
                }
                entries.insert(uri, FileEntry { items, source_mtime });
            }
        }

        self.release(&uris).await;
    }

    async fn acquire(&self, uris: &FxHashSet<Url>) {
        loop {
            {
                let mut in_progress = self.in_progress.lock().await;
                if in_progress.is_disjoint(uris) {
                    in_progress.extend(uris.iter().cloned());
                    return;
                }
            }
            self.in_progress_changed.notified().await;
        }
    }

    async fn release(&self, uris: &FxHashSet<Url>) {
        let mut in_progress = self.in_progress.lock().await;
        for uri in uris {
            in_progress.remove(uri);
        }
        drop(in_progress);
        self.in_progress_changed.notify_waiters();
    }

    /// Marks a URI removed so a concurrent re-scan racing behind this call does not
    /// re-insert it (spec §4.7 "a set of removed URIs tracked separately").
    pub fn mark_removed(&self, uri: &Url) {
        self.entries.write().remove(uri);
        self.removed.write().insert(uri.clone());
    }

    pub fn unmark_removed(&self, uri: &Url) {
        self.removed.write().remove(uri);
    }

    /// `read`: a consistent snapshot of everything indexed so far.
    pub fn read(&self) -> Vec<(Url, Vec<TestItem>)> {
        self.entries
            .read()
            .iter()
            .map(|(uri, entry)| (uri.clone(), entry.items.clone()))
            .collect()
    }

    /// `read`, narrowed to one document (backs `textDocument/tests`).
    pub fn read_document(&self, uri: &Url) -> Vec<TestItem> {
        self.entries
            .read()
            .get(uri)
            .map(|entry| entry.items.clone())
            .unwrap_or_default()
    }

    /// Partitions `uris` into `4 × num_cpus` batches to keep each `index` task's
    /// dependency footprint small (spec §4.7 "Batching").
    pub fn batch(&self, uris: Vec<Url>, num_cpus: usize) -> Vec<Vec<Url>> {
        self.batch_sequence.fetch_add(1, Ordering::Relaxed);
        let batch_count = (4 * num_cpus.max(1)).min(uris.len().max(1));
        let mut batches: Vec<Vec<Url>> = (0..batch_count).map(|_| Vec::new()).collect();
        for (i, uri) in uris.into_iter().enumerate() {
            batches[i % batch_count].push(uri);
        }
        batches.retain(|batch| !batch.is_empty());
        batches
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedScanner;

    #[async_trait]
    impl TestScanner for FixedScanner {
        async fn scan(&self, uri: &Url, _content: &str) -> Vec<TestItem> {
            vec![TestItem {
                id: TestItem::child_id("", "example"),
                label: "example".into(),
                location: Range::default(),
                children: Vec::new(),
                tags: Vec::new(),
            }]
            .into_iter()
            .map(|mut item| {
                item.id = format!("{}:{}", uri, item.id);
                item
            })
            .collect()
        }
    }

    fn uri(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[tokio::test]
    async fn initial_population_runs_once() {
        let index = SyntacticTestIndex::new();
        let scanner = FixedScanner;
        index
            .initial_population(
                &scanner,
                vec![ScanInput {
                    uri: uri("file:///a.swift"),
                    content: String::new(),
                    source_mtime: 1,
                }],
            )
            .await;
        assert_eq!(index.read().len(), 1);

        index
            .initial_population(
                &scanner,
                vec![ScanInput {
                    uri: uri("file:///b.swift"),
                    content: String::new(),
                    source_mtime: 1,
                }],
            )
            .await;
        assert_eq!(index.read().len(), 1);
    }

    #[tokio::test]
    async fn reindex_skips_unchanged_mtime() {
        let index = SyntacticTestIndex::new();
        let scanner = FixedScanner;
        let u = uri("file:///a.swift");
        index
            .reindex(
                &scanner,
                vec![ScanInput {
                    uri: u.clone(),
                    content: String::new(),
                    source_mtime: 5,
                }],
            )
            .await;
        assert_eq!(index.read().len(), 1);

        index
            .reindex(
                &scanner,
                vec![ScanInput {
                    uri: u.clone(),
                    content: String::new(),
                    source_mtime: 5,
                }],
            )
            .await;
        assert_eq!(index.read().len(), 1);
    }

    #[tokio::test]
    async fn removed_uri_is_not_reinserted_by_a_racing_scan() {
        let index = SyntacticTestIndex::new();
        let scanner = FixedScanner;
        let u = uri("file:///a.swift");
        index
            .reindex(
                &scanner,
                vec![ScanInput {
                    uri: u.clone(),
                    content: String::new(),
                    source_mtime: 1,
                }],
            )
            .await;
        index.mark_removed(&u);
        index
            .reindex(
                &scanner,
                vec![ScanInput {
                    uri: u.clone(),
                    content: String::new(),
                    source_mtime: 2,
                }],
            )
            .await;
        assert!(index.read().is_empty());
    }

    #[test]
    fn batching_respects_cpu_multiplier() {
        let index = SyntacticTestIndex::new();
        let uris: Vec<Url> = (0..10).map(|i| uri(&format!("file:///{i}.swift"))).collect();
        let batches = index.batch(uris, 2);
        assert!(batches.len() <= 8);
        assert_eq!(
            batches.iter().map(|b| b.len()).sum::<usize>(),
            10
        );
    }
}
