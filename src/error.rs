//! Error types.
//!
//! `BridgeError` covers a foreign call that did not complete. `CanvasError`
//! is what the handle API and the C ABI report; a bridge failure is carried
//! through unchanged and never retried.

use thiserror::Error;

use crate::types::ForeignOp;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("no foreign surface named `{0}`")]
    UnknownSurface(String),

    #[error("host rejected {op}: {reason}")]
    Rejected { op: ForeignOp, reason: String },

    #[error("bad argument for {op}: {reason}")]
    BadArgument { op: ForeignOp, reason: String },

    #[error("foreign string contains an interior NUL byte")]
    InteriorNul,

    #[error("host error: {0}")]
    Host(String),
}

#[derive(Debug, Error)]
pub enum CanvasError {
    #[error(transparent)]
    Foreign(#[from] BridgeError),

    #[error("surface identity must not be empty")]
    EmptyIdentity,

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid handle: {0}")]
    InvalidHandle(u32),

    #[error("handle {0} has no rendering context; call cnv_get_context first")]
    NoContext(u32),

    #[error("Invalid UTF-8")]
    InvalidUtf8,

    #[error("Invalid style property: {0}")]
    UnknownProperty(u8),

    #[error("Host not initialized. Call cnv_init() first.")]
    NotInitialized,

    #[error("Host already initialized. Call cnv_shutdown() first.")]
    AlreadyInitialized,

    #[error("no DOM host on this target; use cnv_init_headless()")]
    NoHost,

    #[error("host keeps no call journal")]
    NoJournal,

    #[error("{0} bytes do not fit an i32 length")]
    LengthOverflow(usize),

    #[error("{0} lock poisoned after panic")]
    LockPoisoned(String),

    #[error("Host access from non-owner thread is unsupported")]
    NonOwnerThread,
}

pub type Result<T, E = CanvasError> = std::result::Result<T, E>;
