use crate::error::ApiError;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use pdftool::run_with_deadline;
use std::time::Duration;
use tracing::warn;

/// Route middleware bounding the rest of the stack by `budget`.
///
/// The inner handler runs as its own task. When the budget elapses first the
/// client gets a 408 and the task is aborted, which drops its job resources
/// and kills any child process it started.
pub async fn enforce_deadline(
    State(budget): State<Duration>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    match run_with_deadline(budget, next.run(request)).await {
        Ok(response) => response,
        Err(err) => {
            warn!(%method, %path, budget_ms = budget.as_millis() as u64, error = %err, "request did not complete");
            ApiError::from(err).into_response()
        }
    }
}
