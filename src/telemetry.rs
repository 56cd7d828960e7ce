//! Logging setup and the per-request logging scope (spec §4.4, §7, §9 "Logging scope").

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::Span;
use tracing_subscriber::EnvFilter;

/// Initializes the global `tracing` subscriber. Writes to stderr: stdout carries the
/// LSP JSON-RPC stream and must never receive log output.
pub fn init_logging(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Monotonic counter used to key notification logging scopes (which have no
/// client-assigned id to key on).
static NOTIFICATION_COUNTER: AtomicU64 = AtomicU64::new(1);

fn next_notification_counter() -> u64 {
    NOTIFICATION_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Opens a `tracing` span keyed by the low two decimal digits of a request id or
/// notification counter, cheap and sufficient to separate concurrent request logs
/// (spec §9: "Logging scope").
pub fn request_scope(method: &str, request_id: Option<i64>) -> Span {
    let counter = request_id.unwrap_or_else(|| next_notification_counter() as i64);
    let scope = (counter.rem_euclid(100)) as u8;
    tracing::info_span!("request", method = %method, scope = scope)
}
