//! Remote call errors.

use mirror_executor::Transient;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteError {
    /// Network failure, timeout, or temporary rejection. Safe to retry.
    #[error("transient remote failure: {0}")]
    Transient(String),

    /// The service refused the call (rule violation, missing reference).
    #[error("rejected by ledger service: {0}")]
    Rejected(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// The service answered with something that does not decode.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl Transient for RemoteError {
    fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}
