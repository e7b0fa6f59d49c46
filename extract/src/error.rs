use mirror_executor::ExecutorError;
use mirror_remote::RemoteError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    /// A read failed in a way retrying cannot fix.
    #[error("reading {phase} failed: {source}")]
    Remote {
        phase: &'static str,
        #[source]
        source: ExecutorError<RemoteError>,
    },

    /// The service answered, but the answer contradicts the rest of the state.
    #[error("malformed {phase}: {reason}")]
    Malformed { phase: &'static str, reason: String },
}

impl ExtractError {
    pub(crate) fn remote(phase: &'static str) -> impl FnOnce(ExecutorError<RemoteError>) -> Self {
        move |source| Self::Remote { phase, source }
    }

    pub(crate) fn malformed(phase: &'static str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            phase,
            reason: reason.into(),
        }
    }
}
