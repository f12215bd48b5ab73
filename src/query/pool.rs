//! Scoped worker pool for one request.
//!
//! Tasks run on a `JoinSet` that lives only as long as the call, with a
//! semaphore capping how many run at once and a deadline on each task. The
//! call returns after every task has finished, failed or timed out.

use crate::error::EdfsResult;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

#[derive(Debug)]
pub enum TaskOutcome<T> {
    Done(T),
    Failed(String),
    TimedOut,
}

impl<T> TaskOutcome<T> {
    pub fn is_done(&self) -> bool {
        matches!(self, TaskOutcome::Done(_))
    }
}

/// Runs `task` over every input with at most `concurrency` in flight.
/// Outcomes come back in input order.
pub async fn run_bounded<I, T, F, Fut>(
    inputs: Vec<I>,
    concurrency: usize,
    deadline: Duration,
    task: F,
) -> Vec<TaskOutcome<T>>
where
    T: Send + 'static,
    F: Fn(I) -> Fut,
    Fut: Future<Output = EdfsResult<T>> + Send + 'static,
{
    let total = inputs.len();
    let permits = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut set = JoinSet::new();

    for (slot, input) in inputs.into_iter().enumerate() {
        let permits = permits.clone();
        let work = task(input);
        set.spawn(async move {
            let _permit = permits.acquire_owned().await;
            let outcome = match tokio::time::timeout(deadline, work).await {
                Ok(Ok(value)) => TaskOutcome::Done(value),
                Ok(Err(e)) => TaskOutcome::Failed(e.to_string()),
                Err(_) => TaskOutcome::TimedOut,
            };
            (slot, outcome)
        });
    }

    let mut outcomes: Vec<Option<TaskOutcome<T>>> = (0..total).map(|_| None).collect();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((slot, outcome)) => outcomes[slot] = Some(outcome),
            Err(e) => tracing::warn!("Map task aborted: {}", e),
        }
    }

    outcomes
        .into_iter()
        .map(|outcome| outcome.unwrap_or_else(|| TaskOutcome::Failed("task aborted".to_string())))
        .collect()
}
