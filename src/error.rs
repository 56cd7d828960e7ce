//! The core's error taxonomy (kinds, not wire types).
//!
//! Components return `CoreError` values; the dispatcher is the only place that
//! converts them into `tower_lsp::jsonrpc::Error` replies.

use tower_lsp::jsonrpc::{Error as RpcError, ErrorCode};

/// Stable kinds a caller can match on, independent of the human-readable message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Ill-formed message, unknown method, parameter validation failure.
    Protocol,
    /// Operation on missing document, workspace not open, unsupported capability.
    State,
    /// A backend reported failure, timed out, or does not implement a method.
    Backend,
    /// The request was cancelled via `$/cancelRequest`.
    Cancelled,
    /// An internal invariant was violated (double reply, mistagged dependency, ...).
    Internal,
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("document not open: {0}")]
    MissingDocument(String),

    #[error("document already open: {0}")]
    AlreadyOpen(String),

    #[error("no workspace owns {0}")]
    NoWorkspace(String),

    #[error("capability not supported: {0}")]
    UnsupportedCapability(String),

    #[error("backend does not implement {0}")]
    MethodNotImplemented(&'static str),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("request cancelled")]
    Cancelled,

    #[error("internal invariant violated: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Protocol(_) => ErrorKind::Protocol,
            CoreError::MissingDocument(_)
            | CoreError::AlreadyOpen(_)
            | CoreError::NoWorkspace(_)
            | CoreError::UnsupportedCapability(_) => ErrorKind::State,
            CoreError::MethodNotImplemented(_) | CoreError::Backend(_) => ErrorKind::Backend,
            CoreError::Cancelled => ErrorKind::Cancelled,
            CoreError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether this failure should be logged as a fault. Cancellation never is.
    pub fn is_fault(&self) -> bool {
        !matches!(self, CoreError::Cancelled)
    }
}

/// Maps a `CoreError` to the LSP JSON-RPC error the client receives.
///
/// `Cancelled` maps to the dedicated LSP request-cancelled code (`-32800`); everything
/// else maps to a generic server-error code carrying the kind in its data payload so
/// clients can distinguish protocol/state/backend failures if they care to.
impl From<CoreError> for RpcError {
    fn from(err: CoreError) -> Self {
        if let CoreError::Cancelled = err {
            return RpcError {
                code: ErrorCode::ServerError(-32800),
                message: "request cancelled".into(),
                data: None,
            };
        }
        RpcError {
            code: ErrorCode::ServerError(-32000),
            message: err.to_string().into(),
            data: Some(serde_json::json!({ "kind": format!("{:?}", err.kind()) })),
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
