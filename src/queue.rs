//! `MessageHandlingQueue` (spec §4.4, §5): a dependency-tagged async scheduler ordering
//! notifications and requests so state reads never reorder past state writes, while
//! independent work runs in parallel.
//!
//! Grounded on the teacher's `RequestLimiter` (a semaphore gating a single background
//! slot), generalized from "one background slot" into per-tag dependency tracking: each
//! tag maintains its own chain of prior task handles, and a new task only awaits the
//! handles its tag depends on before running.

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tower_lsp::lsp_types::Url;

/// Dependency tag attached to each queued message (spec §5).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DependencyTag {
    /// Depends on and blocks every other tag.
    GlobalConfigurationChange,
    /// Depends on all document tasks for documents belonging to the named workspace.
    WorkspaceRequest { workspace_root: Option<Url> },
    /// Depends on all prior tasks mentioning the same URI, and on configuration changes.
    /// `workspace_root` is the owning workspace's root (or `None` for an implicit/rootless
    /// workspace), so a `WorkspaceRequest` for that root can find this task as a dependency.
    DocumentRequest { uri: Url, workspace_root: Option<Url> },
    /// Same as `DocumentRequest` but also barriers subsequent `DocumentRequest(uri)` tasks.
    DocumentUpdate { uri: Url, workspace_root: Option<Url> },
    /// No dependency.
    Freestanding,
}

#[derive(Default)]
struct QueueState {
    /// The most recent task handle for each document URI; a document task's dependency is
    /// always "whatever ran last for this URI".
    document_barriers: FxHashMap<Url, Arc<Notify>>,
    /// The most recent global-configuration-change barrier, if one is pending/running.
    config_barrier: Option<Arc<Notify>>,
    /// Per-workspace barriers spawned by `DocumentUpdate`/`DocumentRequest`, consulted by
    /// `WorkspaceRequest` so it waits on all document tasks for that workspace.
    workspace_document_barriers: FxHashMap<Option<Url>, Vec<Arc<Notify>>>,
}

/// Schedules and runs handler futures honoring the tag dependency rules in spec §5. This
/// models a "cooperative single-logical-core per queue": tasks that don't depend on each
/// other run concurrently as separate tokio tasks; dependent tasks wait on a `Notify`
/// released when the prior task finishes.
#[derive(Default)]
pub struct MessageHandlingQueue {
    state: Mutex<QueueState>,
}

impl MessageHandlingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues `handler`, returning a `JoinHandle` the caller can use to await completion
    /// or abort for cancellation. The handler only begins running once its tag's
    /// dependencies have completed.
    pub fn enqueue<F, T>(&self, tag: DependencyTag, handler: F) -> JoinHandle<T>
    where
        F: std::future::Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let waiters = self.dependencies_for(&tag);
        let release = Arc::new(Notify::new());
        self.register_barrier(&tag, release.clone());

        tokio::spawn(async move {
            for waiter in waiters {
                waiter.notified().await;
            }
            let result = handler.await;
            release.notify_waiters();
            result
        })
    }

    fn dependencies_for(&self, tag: &DependencyTag) -> Vec<Arc<Notify>> {
        let state = self.state.lock();
        match tag {
            DependencyTag::GlobalConfigurationChange => {
                let mut all: Vec<Arc<Notify>> = state.document_barriers.values().cloned().collect();
                if let Some(config) = &state.config_barrier {
                    all.push(config.clone());
                }
                all
            }
            DependencyTag::WorkspaceRequest { workspace_root } => {
                let mut deps = state
                    .workspace_document_barriers
                    .get(workspace_root)
                    .cloned()
                    .unwrap_or_default();
                if let Some(config) = &state.config_barrier {
                    deps.push(config.clone());
                }
                deps
            }
            DependencyTag::DocumentRequest { uri, .. } | DependencyTag::DocumentUpdate { uri, .. } => {
                let mut deps = Vec::new();
                if let Some(barrier) = state.document_barriers.get(uri) {
                    deps.push(barrier.clone());
                }
                if let Some(config) = &state.config_barrier {
                    deps.push(config.clone());
                }
                deps
            }
            DependencyTag::Freestanding => Vec::new(),
        }
    }

    fn register_barrier(&self, tag: &DependencyTag, release: Arc<Notify>) {
        let mut state = self.state.lock();
        match tag {
            DependencyTag::GlobalConfigurationChange => {
                state.config_barrier = Some(release);
            }
            DependencyTag::DocumentUpdate { uri, workspace_root } => {
                state.document_barriers.insert(uri.clone(), release.clone());
                state
                    .workspace_document_barriers
                    .entry(workspace_root.clone())
                    .or_default()
                    .push(release);
            }
            DependencyTag::DocumentRequest { workspace_root, .. } => {
                state
                    .workspace_document_barriers
                    .entry(workspace_root.clone())
                    .or_default()
                    .push(release);
            }
            DependencyTag::WorkspaceRequest { .. } | DependencyTag::Freestanding => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn document_update_barriers_subsequent_document_request() {
        let queue = MessageHandlingQueue::new();
        let uri = Url::parse("file:///a.swift").unwrap();
        let order = Arc::new(Mutex::new(Vec::new()));

        let order_a = order.clone();
        let update = queue.enqueue(
            DependencyTag::DocumentUpdate { uri: uri.clone(), workspace_root: None },
            async move {
                order_a.lock().push("update");
            },
        );
        update.await.unwrap();

        let order_b = order.clone();
        let request = queue.enqueue(
            DependencyTag::DocumentRequest { uri, workspace_root: None },
            async move {
                order_b.lock().push("request");
            },
        );
        request.await.unwrap();

        assert_eq!(*order.lock(), vec!["update", "request"]);
    }

    #[tokio::test]
    async fn workspace_request_depends_on_document_tasks_for_its_root() {
        let queue = MessageHandlingQueue::new();
        let root = Url::parse("file:///project/").unwrap();
        let uri = Url::parse("file:///project/a.swift").unwrap();
        let order = Arc::new(Mutex::new(Vec::new()));

        let order_a = order.clone();
        let update = queue.enqueue(
            DependencyTag::DocumentUpdate {
                uri,
                workspace_root: Some(root.clone()),
            },
            async move {
                order_a.lock().push("update");
            },
        );
        update.await.unwrap();

        let order_b = order.clone();
        let workspace_request = queue.enqueue(
            DependencyTag::WorkspaceRequest {
                workspace_root: Some(root),
            },
            async move {
                order_b.lock().push("workspace");
            },
        );
        workspace_request.await.unwrap();

        assert_eq!(*order.lock(), vec!["update", "workspace"]);
    }

    #[tokio::test]
    async fn workspace_request_for_a_different_root_does_not_wait() {
        let queue = MessageHandlingQueue::new();
        let root_a = Url::parse("file:///a/").unwrap();
        let root_b = Url::parse("file:///b/").unwrap();
        let uri = Url::parse("file:///a/x.swift").unwrap();
        let gate = Arc::new(Notify::new());

        let gate_clone = gate.clone();
        let update = queue.enqueue(
            DependencyTag::DocumentUpdate {
                uri,
                workspace_root: Some(root_a),
            },
            async move {
                gate_clone.notified().await;
            },
        );

        let workspace_request = queue.enqueue(
            DependencyTag::WorkspaceRequest {
                workspace_root: Some(root_b),
            },
            async move { "done" },
        );
        assert_eq!(workspace_request.await.unwrap(), "done");

        gate.notify_waiters();
        update.await.unwrap();
    }

    #[tokio::test]
    async fn freestanding_tasks_do_not_block_each_other() {
        let queue = MessageHandlingQueue::new();
        let counter = Arc::new(AtomicU32::new(0));
        let a = counter.clone();
        let b = counter.clone();
        let h1 = queue.enqueue(DependencyTag::Freestanding, async move {
            a.fetch_add(1, Ordering::SeqCst);
        });
        let h2 = queue.enqueue(DependencyTag::Freestanding, async move {
            b.fetch_add(1, Ordering::SeqCst);
        });
        h1.await.unwrap();
        h2.await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }
}
