//! Bounded execution of request handlers
//!
//! [`run_with_deadline`] spawns the work as its own task and races it against
//! a timer. When the timer wins the task is aborted, which drops the handler
//! future at its next suspension point: temporary files held by a
//! [`ResourceHandle`](crate::ResourceHandle) are removed by its `Drop`, and
//! child processes spawned with `kill_on_drop` are killed. A timeout therefore
//! stops the work instead of leaving it running behind the response.
//!
//! The one exception is work already running on a blocking thread
//! (`spawn_blocking`), which cannot be interrupted and finishes on its own.

use std::any::Any;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::task::{JoinError, JoinHandle};
use tracing::{error, warn};

/// Why a bounded unit of work produced no result
#[derive(Error, Debug)]
pub enum DeadlineError {
    /// The budget elapsed first; the work was aborted
    #[error("Request timeout")]
    Elapsed(Duration),

    /// The work panicked
    #[error("Handler panicked: {0}")]
    Panicked(String),

    /// The work was cancelled from outside (runtime shutdown)
    #[error("Handler was cancelled")]
    Cancelled,
}

/// Aborts the wrapped task when dropped, so a caller that is itself cancelled
/// (client disconnect) does not leave the work running.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Run `work` with a budget of `budget`.
///
/// Returns the work's output, or [`DeadlineError::Elapsed`] promptly once the
/// budget is spent, or [`DeadlineError::Panicked`] if the work panicked.
pub async fn run_with_deadline<F>(budget: Duration, work: F) -> Result<F::Output, DeadlineError>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let mut task = AbortOnDrop(tokio::spawn(work));

    tokio::select! {
        joined = &mut task.0 => joined.map_err(map_join_error),
        _ = tokio::time::sleep(budget) => {
            warn!(budget_ms = budget.as_millis() as u64, "deadline elapsed, aborting handler");
            task.0.abort();
            Err(DeadlineError::Elapsed(budget))
        }
    }
}

fn map_join_error(err: JoinError) -> DeadlineError {
    if err.is_panic() {
        let message = panic_message(err.into_panic());
        error!(panic = %message, "handler panicked");
        DeadlineError::Panicked(message)
    } else {
        DeadlineError::Cancelled
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Instant;

    #[tokio::test]
    async fn test_completes_within_budget() {
        let result = run_with_deadline(Duration::from_secs(1), async { 42 }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_times_out_promptly() {
        let started = Instant::now();
        let result = run_with_deadline(Duration::from_millis(50), async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            1
        })
        .await;

        assert!(matches!(result, Err(DeadlineError::Elapsed(_))));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_timeout_cancels_work() {
        let finished = Arc::new(AtomicBool::new(false));
        let flag = finished.clone();

        let result = run_with_deadline(Duration::from_millis(20), async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            flag.store(true, Ordering::SeqCst);
        })
        .await;
        assert!(result.is_err());

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(!finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_panic_is_reported() {
        let explode = true;
        let result = run_with_deadline(Duration::from_secs(1), async move {
            if explode {
                panic!("engine exploded");
            }
        })
        .await;

        match result {
            Err(DeadlineError::Panicked(message)) => assert_eq!(message, "engine exploded"),
            other => panic!("Expected panic error, got {other:?}"),
        }
    }

    #[test]
    fn test_error_display() {
        let error = DeadlineError::Elapsed(Duration::from_secs(120));
        assert_eq!(error.to_string(), "Request timeout");
    }
}
