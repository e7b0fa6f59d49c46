//! Chunked fan-out/fan-in over remote calls.

use std::fmt;
use std::future::Future;

use futures_util::future::join_all;
use tracing::{debug, warn};

use crate::error::{ExecutorError, Transient};
use crate::policy::RetryPolicy;

/// Issues remote calls in bounded, strictly sequential chunks.
///
/// At most `batch_size` calls are in flight at once. Chunk `n + 1` is never
/// started before chunk `n` has resolved, and results come back in input
/// order.
pub struct BatchExecutor<P> {
    batch_size: usize,
    policy: P,
}

impl<P: RetryPolicy> BatchExecutor<P> {
    /// Create an executor. A `batch_size` of zero is treated as one.
    pub fn new(batch_size: usize, policy: P) -> Self {
        Self {
            batch_size: batch_size.max(1),
            policy,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Borrow this executor's retry policy with a different chunk size.
    pub fn with_batch_size(&self, batch_size: usize) -> BatchExecutor<&P> {
        BatchExecutor::new(batch_size, &self.policy)
    }

    /// Run every call, chunk by chunk, and return the results in input order.
    ///
    /// A transient failure of any call re-issues the entire chunk once the
    /// policy's delay has elapsed. A permanent failure aborts immediately.
    pub async fn run<T, E, F, Fut>(
        &self,
        label: &str,
        calls: &[F],
    ) -> Result<Vec<T>, ExecutorError<E>>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Transient + fmt::Display,
    {
        let mut results = Vec::with_capacity(calls.len());
        let chunk_count = calls.len().div_ceil(self.batch_size);

        for (chunk_index, chunk) in calls.chunks(self.batch_size).enumerate() {
            let offset = chunk_index * self.batch_size;
            debug!(
                label,
                chunk = chunk_index + 1,
                of = chunk_count,
                calls = chunk.len(),
                "issuing chunk"
            );
            let outcomes = self
                .retry_chunk(label, chunk_index, move || async move {
                    join_all(chunk.iter().map(|call| call()))
                        .await
                        .into_iter()
                        .enumerate()
                        .map(|(i, outcome)| outcome.map_err(|e| (offset + i, e)))
                        .collect::<Result<Vec<T>, (usize, E)>>()
                })
                .await?;
            results.extend(outcomes);
        }

        Ok(results)
    }

    /// Run a single call under the same retry policy.
    pub async fn call<T, E, F, Fut>(&self, label: &str, call: F) -> Result<T, ExecutorError<E>>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Transient + fmt::Display,
    {
        let call = &call;
        self.retry_chunk(label, 0, move || async move { call().await.map_err(|e| (0, e)) })
            .await
    }

    async fn retry_chunk<T, E, A, AFut>(
        &self,
        label: &str,
        chunk: usize,
        mut attempt: A,
    ) -> Result<T, ExecutorError<E>>
    where
        A: FnMut() -> AFut,
        AFut: Future<Output = Result<T, (usize, E)>>,
        E: Transient + fmt::Display,
    {
        let mut failures = 0u32;
        loop {
            let (index, source) = match attempt().await {
                Ok(value) => return Ok(value),
                Err(failure) => failure,
            };

            if !source.is_transient() {
                return Err(ExecutorError::Fatal {
                    chunk,
                    index,
                    source,
                });
            }

            failures = failures.saturating_add(1);
            let Some(delay) = self.policy.next_delay(failures) else {
                return Err(ExecutorError::Exhausted {
                    chunk,
                    attempts: failures,
                    source,
                });
            };

            warn!(
                label,
                chunk,
                index,
                attempt = failures,
                delay_ms = delay.as_millis() as u64,
                error = %source,
                "chunk failed, retrying whole chunk"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{BoundedRetry, FixedDelay};
    use std::cell::Cell;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Debug, PartialEq)]
    enum TestError {
        Flaky,
        Broken,
    }

    impl fmt::Display for TestError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                Self::Flaky => f.write_str("flaky"),
                Self::Broken => f.write_str("broken"),
            }
        }
    }

    impl Transient for TestError {
        fn is_transient(&self) -> bool {
            matches!(self, Self::Flaky)
        }
    }

    fn fast() -> FixedDelay {
        FixedDelay::new(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn empty_input_returns_empty() {
        let executor = BatchExecutor::new(4, fast());
        let calls: Vec<fn() -> std::future::Ready<Result<u32, TestError>>> = Vec::new();
        let results = executor.run("empty", &calls).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn fails_k_times_then_succeeds_with_k_plus_one_attempts() {
        let executor = BatchExecutor::new(1, fast());
        let attempts = Cell::new(0u32);
        let calls = vec![|| {
            let n = attempts.get() + 1;
            attempts.set(n);
            async move {
                if n <= 2 {
                    Err(TestError::Flaky)
                } else {
                    Ok(42u32)
                }
            }
        }];

        let results = executor.run("flaky", &calls).await.unwrap();
        assert_eq!(results, vec![42]);
        assert_eq!(attempts.get(), 3);
    }

    #[tokio::test]
    async fn whole_chunk_is_reissued_on_failure() {
        let executor = BatchExecutor::new(3, fast());
        let counts: Vec<Cell<u32>> = (0..3).map(|_| Cell::new(0)).collect();
        let calls: Vec<_> = counts
            .iter()
            .enumerate()
            .map(|(i, count)| {
                move || {
                    let n = count.get() + 1;
                    count.set(n);
                    async move {
                        if i == 1 && n == 1 {
                            Err(TestError::Flaky)
                        } else {
                            Ok(i)
                        }
                    }
                }
            })
            .collect();

        let results = executor.run("chunk", &calls).await.unwrap();
        assert_eq!(results, vec![0, 1, 2]);
        assert!(counts.iter().all(|c| c.get() == 2));
    }

    #[tokio::test]
    async fn only_failing_chunk_is_reissued() {
        let executor = BatchExecutor::new(2, fast());
        let counts: Vec<Cell<u32>> = (0..4).map(|_| Cell::new(0)).collect();
        let calls: Vec<_> = counts
            .iter()
            .enumerate()
            .map(|(i, count)| {
                move || {
                    let n = count.get() + 1;
                    count.set(n);
                    async move {
                        if i == 3 && n == 1 {
                            Err(TestError::Flaky)
                        } else {
                            Ok(i)
                        }
                    }
                }
            })
            .collect();

        executor.run("second-chunk", &calls).await.unwrap();
        let observed: Vec<u32> = counts.iter().map(Cell::get).collect();
        assert_eq!(observed, vec![1, 1, 2, 2]);
    }

    #[tokio::test]
    async fn results_keep_input_order() {
        let executor = BatchExecutor::new(5, fast());
        let calls: Vec<_> = (0..10u64)
            .map(|i| {
                move || async move {
                    tokio::time::sleep(Duration::from_millis(10 - i)).await;
                    Ok::<_, TestError>(i)
                }
            })
            .collect();

        let results = executor.run("ordered", &calls).await.unwrap();
        assert_eq!(results, (0..10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn in_flight_never_exceeds_batch_size() {
        let executor = BatchExecutor::new(3, fast());
        let in_flight = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        let calls: Vec<_> = (0..10)
            .map(|i| {
                let in_flight = &in_flight;
                let peak = &peak;
                move || async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(2)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, TestError>(i)
                }
            })
            .collect();

        executor.run("bounded", &calls).await.unwrap();
        assert_eq!(peak.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_failure_is_not_retried() {
        let executor = BatchExecutor::new(2, fast());
        let attempts = Cell::new(0u32);
        let calls: Vec<_> = (0..4)
            .map(|i| {
                let attempts = &attempts;
                move || {
                    attempts.set(attempts.get() + 1);
                    async move {
                        if i == 2 {
                            Err(TestError::Broken)
                        } else {
                            Ok(i)
                        }
                    }
                }
            })
            .collect();

        let err = executor.run("broken", &calls).await.unwrap_err();
        match err {
            ExecutorError::Fatal {
                chunk,
                index,
                source,
            } => {
                assert_eq!(chunk, 1);
                assert_eq!(index, 2);
                assert_eq!(source, TestError::Broken);
            }
            other => panic!("expected fatal error, got {other:?}"),
        }
        assert_eq!(attempts.get(), 4);
    }

    #[tokio::test]
    async fn bounded_policy_exhausts() {
        let executor = BatchExecutor::new(1, BoundedRetry::new(Duration::from_millis(1), 3));
        let attempts = Cell::new(0u32);
        let err = executor
            .call("always-flaky", || {
                attempts.set(attempts.get() + 1);
                async { Err::<u32, _>(TestError::Flaky) }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ExecutorError::Exhausted { attempts: 3, .. }));
        assert_eq!(attempts.get(), 3);
    }

    #[tokio::test]
    async fn single_call_retries() {
        let executor = BatchExecutor::new(8, fast());
        let attempts = Cell::new(0u32);
        let value = executor
            .call("single", || {
                let n = attempts.get() + 1;
                attempts.set(n);
                async move {
                    if n == 1 {
                        Err(TestError::Flaky)
                    } else {
                        Ok("done")
                    }
                }
            })
            .await
            .unwrap();
        assert_eq!(value, "done");
        assert_eq!(attempts.get(), 2);
    }

    #[test]
    fn zero_batch_size_is_clamped() {
        assert_eq!(BatchExecutor::new(0, fast()).batch_size(), 1);
        assert_eq!(BatchExecutor::new(7, fast()).with_batch_size(0).batch_size(), 1);
    }
}
