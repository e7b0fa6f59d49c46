//! Executor error types.

use thiserror::Error;

/// Classifies call failures into retryable and permanent ones.
pub trait Transient {
    /// Whether retrying the same call could succeed.
    fn is_transient(&self) -> bool;
}

#[derive(Debug, Error)]
pub enum ExecutorError<E> {
    /// A call failed in a way retrying cannot fix.
    #[error("call {index} in chunk {chunk} failed permanently: {source}")]
    Fatal {
        chunk: usize,
        index: usize,
        #[source]
        source: E,
    },

    /// The retry policy gave up on a chunk.
    #[error("chunk {chunk} still failing after {attempts} attempts: {source}")]
    Exhausted {
        chunk: usize,
        attempts: u32,
        #[source]
        source: E,
    },
}
