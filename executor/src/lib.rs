//! Batched call executor.
//!
//! Every remote read and write the migration engine issues goes through
//! [`BatchExecutor`]: an ordered list of zero-argument calls is cut into
//! contiguous chunks, each chunk is issued concurrently, and the next chunk
//! starts only after the previous one fully resolved. A transient failure
//! anywhere in a chunk re-issues the whole chunk after the delay chosen by a
//! [`RetryPolicy`]; the default policy never gives up.

pub mod error;
pub mod executor;
pub mod policy;

pub use error::{ExecutorError, Transient};
pub use executor::BatchExecutor;
pub use policy::{BoundedRetry, FixedDelay, RetryPolicy};
