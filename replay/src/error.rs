use mirror_executor::ExecutorError;
use mirror_remote::RemoteError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReplayError {
    /// The target cannot hold the snapshot's records as they are: an id the
    /// target assigned differs from the source, or the target rejected a
    /// record. Retrying would not change the outcome.
    #[error("structural mismatch in {phase} at {id}: {reason}")]
    Structural {
        phase: &'static str,
        id: String,
        reason: String,
    },

    #[error("{phase} failed: {source}")]
    Remote {
        phase: &'static str,
        #[source]
        source: ExecutorError<RemoteError>,
    },

    /// The target was sealed before it received the snapshot's types.
    #[error("target is sealed but lacks {missing} type(s) from the snapshot")]
    Sealed { missing: usize },
}

impl ReplayError {
    pub(crate) fn structural(
        phase: &'static str,
        id: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        Self::Structural {
            phase,
            id: id.to_string(),
            reason: reason.into(),
        }
    }

    /// Classify an executor failure. Rejections name the record at the
    /// failing call's position.
    pub(crate) fn from_executor(
        phase: &'static str,
        err: ExecutorError<RemoteError>,
        id_of: impl Fn(usize) -> String,
    ) -> Self {
        match err {
            ExecutorError::Fatal {
                index,
                source: RemoteError::Rejected(reason) | RemoteError::NotFound(reason),
                ..
            } => Self::Structural {
                phase,
                id: id_of(index),
                reason,
            },
            other => Self::Remote {
                phase,
                source: other,
            },
        }
    }

    /// For reads, where any failure is a remote failure.
    pub(crate) fn remote(phase: &'static str) -> impl FnOnce(ExecutorError<RemoteError>) -> Self {
        move |source| Self::Remote { phase, source }
    }

    pub fn is_structural(&self) -> bool {
        matches!(self, Self::Structural { .. })
    }
}
