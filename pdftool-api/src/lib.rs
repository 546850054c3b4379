//! HTTP surface for pdftool
//!
//! | Route              | Auth | Deadline            | Purpose                        |
//! |--------------------|------|---------------------|--------------------------------|
//! | `GET /ping`        | no   |                     | liveness                       |
//! | `GET /health`      | no   |                     | status and version             |
//! | `POST /login`      | no   |                     | start a browser session        |
//! | `GET /check-auth`  | no   |                     | is the session cookie valid    |
//! | `POST /v1/encrypt` | yes  | `TRANSFORM_TIMEOUT` | password-protect a PDF         |
//! | `POST /v1/decrypt` | yes  | `TRANSFORM_TIMEOUT` | remove password protection     |
//! | `POST /v1/optimize`| yes  | `TRANSFORM_TIMEOUT` | shrink a PDF                   |
//! | `POST /v1/repair`  | yes  | `TRANSFORM_TIMEOUT` | rebuild a damaged PDF          |
//! | `POST /v1/ocr`     | yes  | `OCR_TIMEOUT`       | recognize text (S3 + OCR only) |

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod auth;
pub mod config;
pub mod deadline;
pub mod decode;
pub mod error;
pub mod routes;
pub mod state;
pub mod telemetry;

pub use auth::{Authenticator, Credential, SESSION_COOKIE};
pub use config::{parse_duration, Config, ConfigError};
pub use error::{ApiError, ApiResponse};
pub use state::{AppState, StateError};

/// Build the application router with all routes configured
pub fn app(state: AppState) -> Router {
    let config = state.config.clone();

    let mut v1 = Router::new()
        .route("/encrypt", post(routes::transform::encrypt))
        .route("/decrypt", post(routes::transform::decrypt))
        .route("/optimize", post(routes::transform::optimize))
        .route("/repair", post(routes::transform::repair))
        .route_layer(middleware::from_fn_with_state(
            config.transform_timeout,
            deadline::enforce_deadline,
        ));

    if state.ocr_enabled() {
        v1 = v1.merge(
            Router::new()
                .route("/ocr", post(routes::ocr::recognize))
                .route_layer(middleware::from_fn_with_state(
                    config.ocr_timeout,
                    deadline::enforce_deadline,
                )),
        );
    }

    let v1 = v1.route_layer(middleware::from_fn_with_state(
        state.clone(),
        auth::require_credential,
    ));

    Router::new()
        .route("/ping", get(routes::system::ping))
        .route("/health", get(routes::system::health))
        .route("/login", post(auth::login))
        .route("/check-auth", get(auth::check_auth))
        .nest("/v1", v1)
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
