//! `WorkDoneProgressManager` (spec §4.8): per-task and shared refcounted progress
//! reporting, debounced and gated on initialization having completed.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tower_lsp::lsp_types::notification::Progress;
use tower_lsp::lsp_types::{
    ProgressParams, ProgressParamsValue, ProgressToken, WorkDoneProgress, WorkDoneProgressBegin,
    WorkDoneProgressEnd, WorkDoneProgressReport,
};
use tower_lsp::Client;
use uuid::Uuid;

/// Gates progress emission until `initialize` has replied (spec §4.8 "All progress state
/// machines wait for the server to finish initialization before emitting any message").
#[derive(Default)]
pub struct InitGate {
    ready: AtomicBool,
    notify: Notify,
}

impl InitGate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    async fn wait_ready(&self) {
        while !self.ready.load(Ordering::SeqCst) {
            self.notify.notified().await;
        }
    }
}

async fn send_begin(client: &Client, token: &ProgressToken, title: &str, message: Option<String>) {
    let begin = WorkDoneProgressBegin {
        title: title.to_string(),
        cancellable: Some(false),
        message,
        percentage: None,
    };
    let _ = client
        .send_notification::<Progress>(ProgressParams {
            token: token.clone(),
            value: ProgressParamsValue::WorkDone(WorkDoneProgress::Begin(begin)),
        })
        .await;
}

async fn send_report(client: &Client, token: &ProgressToken, message: Option<String>, percentage: Option<u32>) {
    let report = WorkDoneProgressReport {
        cancellable: Some(false),
        message,
        percentage,
    };
    let _ = client
        .send_notification::<Progress>(ProgressParams {
            token: token.clone(),
            value: ProgressParamsValue::WorkDone(WorkDoneProgress::Report(report)),
        })
        .await;
}

async fn send_end(client: &Client, token: &ProgressToken, message: Option<String>) {
    let end = WorkDoneProgressEnd { message };
    let _ = client
        .send_notification::<Progress>(ProgressParams {
            token: token.clone(),
            value: ProgressParamsValue::WorkDone(WorkDoneProgress::End(end)),
        })
        .await;
}

/// Lifecycle tied to a single scope: `begin` on first `update`, `report` on subsequent
/// updates, `end` on drop. Updates that don't change `(message, percentage)` are
/// suppressed (spec §4.8 "Per-task manager").
pub struct PerTaskProgressManager {
    client: Client,
    token: ProgressToken,
    title: String,
    gate: Arc<InitGate>,
    began: AtomicBool,
    last: Mutex<Option<(Option<String>, Option<u32>)>>,
}

impl PerTaskProgressManager {
    pub fn new(client: Client, gate: Arc<InitGate>, title: impl Into<String>) -> Self {
        Self {
            client,
            token: ProgressToken::String(Uuid::new_v4().to_string()),
            title: title.into(),
            gate,
            began: AtomicBool::new(false),
            last: Mutex::new(None),
        }
    }

    pub fn token(&self) -> &ProgressToken {
        &self.token
    }

    pub async fn update(&self, message: Option<String>, percentage: Option<u32>) {
        {
            let mut last = self.last.lock();
            if *last == Some((message.clone(), percentage)) {
                return;
            }
            *last = Some((message.clone(), percentage));
        }

        self.gate.wait_ready().await;

        if !self.began.swap(true, Ordering::SeqCst) {
            send_begin(&self.client, &self.token, &self.title, message).await;
        } else {
            send_report(&self.client, &self.token, message, percentage).await;
        }
    }
}

impl Drop for PerTaskProgressManager {
    fn drop(&mut self) {
        if !self.began.load(Ordering::SeqCst) {
            return;
        }
        let client = self.client.clone();
        let token = self.token.clone();
        tokio::spawn(async move { send_end(&client, &token, None).await });
    }
}

/// A `start()/end()` pair increments/decrements a counter; the underlying per-task manager
/// is created on the `0 → 1` edge and torn down on the `1 → 0` edge (spec §4.8 "Shared
/// counted manager"). Used for workspace-level states multiple callers may enter, such as
/// "backend crashed, restoring".
pub struct SharedWorkDoneProgressManager {
    client: Client,
    gate: Arc<InitGate>,
    title: String,
    count: AtomicU64,
    active: Mutex<Option<Arc<PerTaskProgressManager>>>,
}

impl SharedWorkDoneProgressManager {
    pub fn new(client: Client, gate: Arc<InitGate>, title: impl Into<String>) -> Self {
        Self {
            client,
            gate,
            title: title.into(),
            count: AtomicU64::new(0),
            active: Mutex::new(None),
        }
    }

    /// Enters the shared state; on the `0 → 1` edge, begins progress.
    pub async fn start(&self, message: Option<String>) {
        let previous = self.count.fetch_add(1, Ordering::SeqCst);
        if previous == 0 {
            let manager = Arc::new(PerTaskProgressManager::new(
                self.client.clone(),
                self.gate.clone(),
                self.title.clone(),
            ));
            manager.update(message, None).await;
            *self.active.lock() = Some(manager);
        }
    }

    /// Leaves the shared state; on the `1 → 0` edge, ends progress by dropping the
    /// per-task manager.
    pub fn end(&self) {
        let previous = self.count.fetch_sub(1, Ordering::SeqCst);
        if previous == 1 {
            *self.active.lock() = None;
        }
    }

    pub fn active_count(&self) -> u64 {
        self.count.load(Ordering::SeqCst)
    }
}
