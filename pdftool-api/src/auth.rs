//! Authentication gate for `/v1`
//!
//! Two interchangeable strategies prove a caller may use the API: a bearer
//! API key for programmatic clients and a session cookie for the browser UI.
//! Each request's presented credentials are collected into [`Credential`]
//! values and checked by [`Authenticator::verify`], which has one validation
//! path per strategy. With neither strategy configured the gate is open.

use crate::error::{ApiError, ApiResponse};
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use subtle::ConstantTimeEq;
use tracing::{info, warn};
use uuid::Uuid;

/// Name of the cookie carrying the session token
pub const SESSION_COOKIE: &str = "pdftool_session";

/// Proof of identity presented by a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// `Authorization: Bearer <key>`
    ApiKey(String),
    /// Session token from the [`SESSION_COOKIE`] cookie
    Session(String),
}

impl Credential {
    /// Every credential found in `headers`, bearer key first
    pub fn presented(headers: &HeaderMap) -> Vec<Credential> {
        let mut found = Vec::new();
        if let Some(key) = bearer_token(headers) {
            found.push(Credential::ApiKey(key));
        }
        if let Some(token) = session_token(headers) {
            found.push(Credential::Session(token));
        }
        found
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| {
            let (scheme, token) = value.trim().split_once(' ')?;
            scheme.eq_ignore_ascii_case("bearer").then(|| token.trim())
        })
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, token)| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

/// Compare secrets in constant time
fn secrets_match(presented: &str, expected: &str) -> bool {
    if presented.len() != expected.len() {
        return false;
    }
    bool::from(presented.as_bytes().ct_eq(expected.as_bytes()))
}

#[derive(Debug)]
struct Account {
    username: String,
    password: String,
}

/// Validates credentials and owns the in-memory session table
#[derive(Debug)]
pub struct Authenticator {
    api_key: Option<String>,
    account: Option<Account>,
    session_ttl: Duration,
    secure_cookies: bool,
    sessions: Mutex<HashMap<String, Instant>>,
}

impl Authenticator {
    pub fn new(
        api_key: Option<String>,
        account: Option<(String, String)>,
        session_ttl: Duration,
    ) -> Self {
        Self {
            api_key: api_key.filter(|key| !key.is_empty()),
            account: account.map(|(username, password)| Account { username, password }),
            session_ttl,
            secure_cookies: true,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Whether session cookies carry `Secure` (on by default)
    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.secure_cookies = secure;
        self
    }

    /// True when no strategy is configured and every request passes
    pub fn is_open(&self) -> bool {
        self.api_key.is_none() && self.account.is_none()
    }

    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    pub fn verify(&self, credential: &Credential) -> bool {
        match credential {
            Credential::ApiKey(key) => self.verify_api_key(key),
            Credential::Session(token) => self.verify_session(token),
        }
    }

    fn verify_api_key(&self, key: &str) -> bool {
        self.api_key
            .as_deref()
            .is_some_and(|expected| secrets_match(key, expected))
    }

    fn verify_session(&self, token: &str) -> bool {
        let mut sessions = self.sessions();
        let now = Instant::now();
        sessions.retain(|_, expires| *expires > now);
        sessions.contains_key(token)
    }

    /// Start a session for matching credentials and return its token
    pub fn login(&self, username: &str, password: &str) -> Option<String> {
        let account = self.account.as_ref()?;
        // evaluate both so timing does not reveal which one was wrong
        let user_ok = secrets_match(username, &account.username);
        let pass_ok = secrets_match(password, &account.password);
        if !(user_ok && pass_ok) {
            return None;
        }

        let token = Uuid::new_v4().simple().to_string();
        let mut sessions = self.sessions();
        let now = Instant::now();
        sessions.retain(|_, expires| *expires > now);
        sessions.insert(token.clone(), now + self.session_ttl);
        Some(token)
    }

    /// `Set-Cookie` value carrying `token`
    pub fn session_cookie(&self, token: &str) -> String {
        let mut cookie = format!(
            "{SESSION_COOKIE}={token}; Path=/; Max-Age={}; HttpOnly",
            self.session_ttl.as_secs()
        );
        if self.secure_cookies {
            cookie.push_str("; Secure");
        }
        cookie.push_str("; SameSite=Strict");
        cookie
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<String, Instant>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Middleware admitting requests that present at least one valid credential
pub async fn require_credential(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if state.auth.is_open() {
        return Ok(next.run(request).await);
    }

    let presented = Credential::presented(request.headers());
    if presented.is_empty() {
        return Err(ApiError::Unauthorized(
            "Missing or malformed API key".to_string(),
        ));
    }

    if presented.iter().any(|credential| state.auth.verify(credential)) {
        Ok(next.run(request).await)
    } else {
        warn!(path = %request.uri().path(), "rejected invalid credential");
        Err(ApiError::Unauthorized(
            "Invalid or expired credentials".to_string(),
        ))
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// `POST /login`
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload.map_err(|_| ApiError::bad_request("Invalid request"))?;

    let token = state
        .auth
        .login(&request.username, &request.password)
        .ok_or_else(|| ApiError::Unauthorized("Invalid credentials".to_string()))?;

    info!(username = %request.username, "session started");

    let cookie = state.auth.session_cookie(&token);
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(ApiResponse::<()>::message("Login successful")),
    )
        .into_response())
}

/// `GET /check-auth`
pub async fn check_auth(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let authenticated = session_token(&headers)
        .is_some_and(|token| state.auth.verify(&Credential::Session(token)));

    if authenticated {
        Ok(Json(ApiResponse::message("Authenticated")))
    } else {
        Err(ApiError::Unauthorized("Unauthorized".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn authenticator(ttl: Duration) -> Authenticator {
        Authenticator::new(
            Some("secret-key".to_string()),
            Some(("admin".to_string(), "hunter2".to_string())),
            ttl,
        )
    }

    #[test]
    fn test_presented_credentials() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; pdftool_session=tok123"),
        );

        assert_eq!(
            Credential::presented(&headers),
            vec![
                Credential::ApiKey("abc".to_string()),
                Credential::Session("tok123".to_string()),
            ]
        );
    }

    #[test]
    fn test_malformed_authorization_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(Credential::presented(&headers).is_empty());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert!(Credential::presented(&headers).is_empty());
    }

    #[test]
    fn test_api_key_strategy() {
        let auth = authenticator(Duration::from_secs(60));
        assert!(auth.verify(&Credential::ApiKey("secret-key".to_string())));
        assert!(!auth.verify(&Credential::ApiKey("secret-kez".to_string())));
        assert!(!auth.verify(&Credential::ApiKey("secret".to_string())));
    }

    #[test]
    fn test_session_strategy() {
        let auth = authenticator(Duration::from_secs(60));
        assert!(auth.login("admin", "wrong").is_none());

        let token = auth.login("admin", "hunter2").unwrap();
        assert!(auth.verify(&Credential::Session(token)));
        assert!(!auth.verify(&Credential::Session("forged".to_string())));
    }

    #[test]
    fn test_secrets_match() {
        assert!(secrets_match("hunter2", "hunter2"));
        assert!(!secrets_match("hunter3", "hunter2"));
        assert!(!secrets_match("hunter", "hunter2"));
        assert!(!secrets_match("", "hunter2"));
    }

    #[test]
    fn test_session_cookie_attributes() {
        let auth = authenticator(Duration::from_secs(3600));
        assert_eq!(
            auth.session_cookie("tok"),
            "pdftool_session=tok; Path=/; Max-Age=3600; HttpOnly; Secure; SameSite=Strict"
        );

        let plain = authenticator(Duration::from_secs(60)).with_secure_cookies(false);
        assert_eq!(
            plain.session_cookie("tok"),
            "pdftool_session=tok; Path=/; Max-Age=60; HttpOnly; SameSite=Strict"
        );
    }

    #[test]
    fn test_sessions_expire() {
        let auth = authenticator(Duration::from_millis(10));
        let token = auth.login("admin", "hunter2").unwrap();
        std::thread::sleep(Duration::from_millis(30));
        assert!(!auth.verify(&Credential::Session(token)));
    }

    #[test]
    fn test_open_without_strategies() {
        let auth = Authenticator::new(Some(String::new()), None, Duration::from_secs(1));
        assert!(auth.is_open());
        assert!(auth.login("admin", "x").is_none());
    }
}
