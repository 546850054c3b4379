//! Encrypt, decrypt, optimize and repair

use crate::decode::{decode_job, DecodedJob};
use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use pdftool::Operation;
use tracing::info;

/// `POST /v1/encrypt`
pub async fn encrypt(State(state): State<AppState>, request: Request) -> Result<Response, ApiError> {
    transform(state, Operation::Encrypt, request).await
}

/// `POST /v1/decrypt`
pub async fn decrypt(State(state): State<AppState>, request: Request) -> Result<Response, ApiError> {
    transform(state, Operation::Decrypt, request).await
}

/// `POST /v1/optimize`
pub async fn optimize(State(state): State<AppState>, request: Request) -> Result<Response, ApiError> {
    transform(state, Operation::Optimize, request).await
}

/// `POST /v1/repair`
pub async fn repair(State(state): State<AppState>, request: Request) -> Result<Response, ApiError> {
    transform(state, Operation::Repair, request).await
}

async fn transform(
    state: AppState,
    operation: Operation,
    request: Request,
) -> Result<Response, ApiError> {
    let DecodedJob { job, resources } = decode_job(&state, operation, request).await?;

    state.invoker.invoke(&job, &resources).await?;

    // The download is fully read before the job directory goes away
    let document = tokio::fs::read(resources.output_path()).await?;
    resources.release();

    let filename = job.output_filename();
    info!(%operation, %filename, bytes = document.len(), "sending transformed document");

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        document,
    )
        .into_response())
}
