//! Wave-by-wave parallel execution of a dependency-ordered batch of tool
//! calls, bounded by a semaphore and per-call timeouts.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::Semaphore;

use crate::error::{Error, ExecutorError};

use super::dependency::{DependencyGraph, ToolCall};

const DEFAULT_CONCURRENCY: usize = 10;

/// The outcome of one call within a batch.
#[derive(Debug)]
pub struct ToolCallResult {
    /// The call's original position in the request.
    pub index: usize,
    /// The call's outcome.
    pub value: Result<Value, Error>,
}

/// The result of executing a batch: either every call completed, or
/// execution stopped early after a fatal error, in which case `completed`
/// still holds every result gathered up to that point.
#[derive(Debug)]
pub enum ExecutorOutcome {
    /// Every call in the batch ran to completion (individual calls may
    /// still have failed, if no classifier marked them fatal).
    Completed(Vec<ToolCallResult>),
    /// A fatal error stopped execution after the current wave.
    Partial {
        /// Results gathered before the fatal error.
        completed: Vec<ToolCallResult>,
        /// The error that stopped execution.
        error: ExecutorError,
    },
}

/// Classifies every error as fatal — the default policy.
#[must_use]
pub fn is_fatal_default(_: &Error) -> bool {
    true
}

/// Executes a dependency-ordered batch of tool calls wave by wave.
pub struct ParallelExecutor {
    semaphore: Arc<Semaphore>,
    per_call_timeout: Option<Duration>,
}

impl ParallelExecutor {
    /// Creates an executor with `concurrency` permits and an optional
    /// per-call timeout.
    #[must_use]
    pub fn new(concurrency: usize, per_call_timeout: Option<Duration>) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(concurrency.max(1))),
            per_call_timeout,
        }
    }

    /// Runs `calls` with the default concurrency of 10 permits and no
    /// per-call timeout.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_CONCURRENCY, None)
    }

    /// Executes `calls`, grouping them into waves via [`DependencyGraph`]
    /// and running each wave's calls concurrently (bounded by this
    /// executor's semaphore). `run` performs one call; `is_fatal` decides,
    /// after each wave, whether any error seen in it should stop execution.
    pub async fn execute<F, Fut>(
        &self,
        calls: Vec<ToolCall>,
        is_fatal: impl Fn(&Error) -> bool,
        run: F,
    ) -> ExecutorOutcome
    where
        F: Fn(ToolCall) -> Fut,
        Fut: Future<Output = Result<Value, Error>> + Send + 'static,
    {
        let graph = DependencyGraph::build(&calls);

        let mut by_index: std::collections::HashMap<usize, ToolCall> =
            calls.into_iter().map(|c| (c.index, c)).collect();

        let mut completed = Vec::new();
        for wave in graph.waves() {
            let mut handles = Vec::new();
            for &idx in wave {
                let Some(call) = by_index.remove(&idx) else {
                    continue;
                };
                let fut = run(call);
                let permit = Arc::clone(&self.semaphore);
                let timeout = self.per_call_timeout;
                handles.push(tokio::spawn(async move {
                    let _permit = permit.acquire_owned().await.expect("semaphore not closed");
                    let value = match timeout {
                        Some(d) => match tokio::time::timeout(d, fut).await {
                            Ok(v) => v,
                            Err(_) => Err(Error::Executor(ExecutorError::Timeout(idx))),
                        },
                        None => fut.await,
                    };
                    ToolCallResult { index: idx, value }
                }));
            }

            let mut wave_had_fatal = None;
            for handle in handles {
                match handle.await {
                    Ok(result) => {
                        if let Err(e) = &result.value {
                            if is_fatal(e) && wave_had_fatal.is_none() {
                                wave_had_fatal = Some(ExecutorError::WaveFailed {
                                    source: Box::new(clone_error_shape(e)),
                                    index: result.index,
                                });
                            }
                        }
                        completed.push(result);
                    }
                    Err(join_err) => {
                        wave_had_fatal = Some(ExecutorError::WaveFailed {
                            source: Box::new(Error::Config(join_err.to_string())),
                            index: 0,
                        });
                    }
                }
            }

            if let Some(error) = wave_had_fatal {
                return ExecutorOutcome::Partial { completed, error };
            }
        }

        completed.sort_by_key(|r| r.index);
        ExecutorOutcome::Completed(completed)
    }
}

/// `Error` doesn't implement `Clone`; this reconstructs an equivalent one
/// from its `Display` text for embedding in `ExecutorError::WaveFailed`.
fn clone_error_shape(e: &Error) -> Error {
    Error::Config(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn call(name: &str, index: usize) -> ToolCall {
        ToolCall {
            name: name.to_string(),
            params: Map::new(),
            index,
        }
    }

    #[tokio::test]
    async fn test_all_calls_complete_when_no_errors() {
        let executor = ParallelExecutor::with_defaults();
        let calls = vec![call("read_file", 0), call("read_file", 1)];
        let outcome = executor
            .execute(calls, is_fatal_default, |c| async move {
                Ok(Value::String(c.name))
            })
            .await;
        match outcome {
            ExecutorOutcome::Completed(results) => assert_eq!(results.len(), 2),
            ExecutorOutcome::Partial { .. } => panic!("expected Completed"),
        }
    }

    #[tokio::test]
    async fn test_fatal_error_yields_partial_outcome() {
        let executor = ParallelExecutor::with_defaults();
        let calls = vec![call("read_file", 0)];
        let outcome = executor
            .execute(calls, is_fatal_default, |_| async move {
                Err(Error::Config("boom".to_string()))
            })
            .await;
        match outcome {
            ExecutorOutcome::Partial { completed, .. } => assert_eq!(completed.len(), 1),
            ExecutorOutcome::Completed(_) => panic!("expected Partial"),
        }
    }

    #[tokio::test]
    async fn test_non_fatal_error_still_completes_batch() {
        let executor = ParallelExecutor::with_defaults();
        let calls = vec![call("read_file", 0), call("read_file", 1)];
        let outcome = executor
            .execute(calls, |_| false, |c| async move {
                if c.index == 0 {
                    Err(Error::Config("soft failure".to_string()))
                } else {
                    Ok(Value::Bool(true))
                }
            })
            .await;
        match outcome {
            ExecutorOutcome::Completed(results) => assert_eq!(results.len(), 2),
            ExecutorOutcome::Partial { .. } => panic!("expected Completed"),
        }
    }
}
