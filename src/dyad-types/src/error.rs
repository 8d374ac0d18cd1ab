use std::fmt;

use thiserror::Error;

/// Stable error taxonomy for the coordination engine (spec §7).
///
/// Every variant maps to one of the enumerated codes a reimplementation is
/// expected to surface in logs. Hook bodies catch these, log at most once,
/// and never let them escape to the host application — see
/// [`crate::error::log_and_discard`].
#[derive(Debug, Error)]
pub enum DyadError {
    #[error("SYSFAIL: {0}")]
    SysFail(String),

    #[error("NOCTX: coordination context not initialized")]
    NoCtx,

    #[error("FLUXFAIL: {0}")]
    FluxFail(String),

    #[error("BADCOMMIT: {0}")]
    BadCommit(String),

    #[error("BADLOOKUP: {0}")]
    BadLookup(String),

    #[error("BADFETCH: {0}")]
    BadFetch(String),

    #[error("BADRESPONSE: {0}")]
    BadResponse(String),

    #[error("BADRPC: {0}")]
    BadRpc(String),

    #[error("BADFIO: {0}")]
    BadFio(String),

    #[error("BADMANAGEDPATH: {0}")]
    BadManagedPath(String),

    #[error("BADPACK: {0}")]
    BadPack(String),

    #[error("BADUNPACK: {0}")]
    BadUnpack(String),

    #[error("RPC_FINISHED: end-of-stream before any bytes were received")]
    RpcFinished,

    /// Reserved for parity with the spec's taxonomy; nothing in this engine
    /// base64-decodes anything, so this is never constructed.
    #[error("BAD_B64DECODE")]
    BadB64Decode,

    #[error("BAD_COMM_MODE: {0}")]
    BadCommMode(String),
}

impl DyadError {
    /// The stable code token, independent of the human-readable message.
    pub fn code(&self) -> &'static str {
        match self {
            Self::SysFail(_) => "SYSFAIL",
            Self::NoCtx => "NOCTX",
            Self::FluxFail(_) => "FLUXFAIL",
            Self::BadCommit(_) => "BADCOMMIT",
            Self::BadLookup(_) => "BADLOOKUP",
            Self::BadFetch(_) => "BADFETCH",
            Self::BadResponse(_) => "BADRESPONSE",
            Self::BadRpc(_) => "BADRPC",
            Self::BadFio(_) => "BADFIO",
            Self::BadManagedPath(_) => "BADMANAGEDPATH",
            Self::BadPack(_) => "BADPACK",
            Self::BadUnpack(_) => "BADUNPACK",
            Self::RpcFinished => "RPC_FINISHED",
            Self::BadB64Decode => "BAD_B64DECODE",
            Self::BadCommMode(_) => "BAD_COMM_MODE",
        }
    }
}

pub type DyadResult<T> = Result<T, DyadError>;

/// Log a coordination failure at most once and discard it — the boundary
/// hook bodies call at the edge of the real I/O call (spec §7: "never
/// propagated to the host application").
pub fn log_and_discard<T: fmt::Display>(where_: &str, debug: bool, err: T) {
    if debug {
        tracing::debug!(target: "dyad", where_, %err, "coordination failure");
    } else {
        tracing::info!(target: "dyad", where_, %err, "coordination failure");
    }
}
