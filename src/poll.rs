use crate::error::DeployError;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::debug;

/// Outcome of a bounded wait that did not reach its predicate.
#[derive(Debug)]
pub enum PollError<T> {
    /// The deadline elapsed; `last` is the freshest state observed, so callers
    /// can report *what* is still unsatisfied.
    DeadlineExceeded { last: T },
    /// Fetching state failed. Never swallowed, with the single exception of
    /// the deletion variant treating not-found as success.
    Fetch(DeployError),
}

/// Re-evaluates `predicate` over freshly fetched state every `interval` until
/// it holds or `deadline` elapses. The deadline is wall-clock, not a retry
/// count. State is never cached between evaluations.
pub async fn poll_until<T, F, Fut, P>(
    interval: Duration,
    deadline: Duration,
    mut fetch: F,
    predicate: P,
) -> Result<T, PollError<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DeployError>>,
    P: Fn(&T) -> bool,
{
    let expires_at = Instant::now() + deadline;
    loop {
        let state = fetch().await.map_err(PollError::Fetch)?;
        if predicate(&state) {
            return Ok(state);
        }
        if Instant::now() >= expires_at {
            return Err(PollError::DeadlineExceeded { last: state });
        }
        sleep(interval).await;
    }
}

/// Deletion variant: waits until fetching the resource yields the
/// distinguished not-found signal. A resource vanishing is success here, any
/// other fetch error still aborts the wait.
pub async fn wait_until_gone<F, Fut, T>(
    interval: Duration,
    deadline: Duration,
    mut fetch: F,
) -> Result<(), PollError<()>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DeployError>>,
{
    let expires_at = Instant::now() + deadline;
    loop {
        match fetch().await {
            Err(err) if err.is_not_found() => return Ok(()),
            Err(err) => return Err(PollError::Fetch(err)),
            Ok(_) => {
                debug!("resource still present, waiting for deletion");
            }
        }
        if Instant::now() >= expires_at {
            return Err(PollError::DeadlineExceeded { last: () });
        }
        sleep(interval).await;
    }
}
