//! Error types for the ledger-core library

use thiserror::Error;

/// Typed error kinds for ledger operations, mapped 1:1 by the transport
/// layer onto whatever status codes it uses. The core never logs and
/// swallows an error — every fallible path returns one of these.
#[derive(Error, Debug)]
pub enum Error {
    /// Input violates a stated rule (imbalanced journal, non-positive
    /// amount, unknown account, currency mismatch, deactivated account
    /// referenced, bad cursor).
    #[error("validation error: {0}")]
    Validation(String),

    /// Named entity absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// Uniqueness violation or state violation (reversing an
    /// already-reversed journal, duplicate account id).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Actor lacks workplace membership or role. Enforced by external
    /// authz; the core only preserves and surfaces the kind.
    #[error("permission denied: {0}")]
    Permission(String),

    /// Storage I/O or an invariant violation observed at runtime.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for ledger-core and ledger-store operations.
pub type Result<T> = std::result::Result<T, Error>;
