//! HTTP client for the dashboard's REST/JSON backend.
//!
//! Authentication is handled by pluggable [`TokenSource`] implementations;
//! the client attaches the bearer token to every request and maps HTTP
//! failures to [`ApiError`], which converts into
//! [`qdash_core::ServiceError`].
//!
//! # Usage
//!
//! ```ignore
//! use qdash_client::{ApiClient, PasswordLogin};
//!
//! let ts = PasswordLogin::new("http://localhost:5000", "kim", "secret");
//! let client = ApiClient::new("http://localhost:5000", Arc::new(ts));
//! let rows: Vec<serde_json::Value> = client.get_json("/api/inspections").await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use qdash_core::ServiceError;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::debug;

// ── Error ───────────────────────────────────────────────────────────

/// Client-side API error.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP {status}: {message}")]
    Server { status: u16, message: String },

    #[error("network: {0}")]
    Network(#[from] reqwest::Error),

    #[error("auth: {0}")]
    Auth(String),

    #[error("decode: {0}")]
    Decode(String),
}

impl From<ApiError> for ServiceError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Server { status, message } => ServiceError::from_status(status, message),
            ApiError::Network(e) => ServiceError::Storage(format!("network: {e}")),
            ApiError::Auth(msg) => ServiceError::Unauthorized(msg),
            ApiError::Decode(msg) => ServiceError::Internal(format!("decode: {msg}")),
        }
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Pull the human-readable message out of an error response body.
///
/// The backend answers `{"message": "..."}` (optionally with a `code`);
/// anything else is passed through as-is.
pub fn error_message(status: u16, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        return parsed.message;
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {status}")
    } else {
        trimmed.to_string()
    }
}

// ── TokenSource ─────────────────────────────────────────────────────

/// Pluggable token provider. Called before every API request.
///
/// Returns `Ok(None)` to skip the Authorization header (anonymous).
#[async_trait::async_trait]
pub trait TokenSource: Send + Sync + 'static {
    async fn token(&self) -> Result<Option<String>, ApiError>;
}

/// No authentication; requests go out anonymous.
pub struct NoAuth;

#[async_trait::async_trait]
impl TokenSource for NoAuth {
    async fn token(&self) -> Result<Option<String>, ApiError> {
        Ok(None)
    }
}

/// Static bearer token (already obtained externally).
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait::async_trait]
impl TokenSource for StaticToken {
    async fn token(&self) -> Result<Option<String>, ApiError> {
        Ok(Some(self.0.clone()))
    }
}

/// Password-based login against `POST {base}/api/login`. Lazily
/// authenticates on first use, caches the token for `ttl`, and logs in
/// again once it has expired.
pub struct PasswordLogin {
    http: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
    ttl: Duration,
    cached: tokio::sync::RwLock<Option<CachedToken>>,
}

struct CachedToken {
    token: String,
    /// Absolute expiry timestamp (seconds since epoch).
    expires_at: i64,
}

/// `{"message", "token", "user"}`; only the token is used.
#[derive(Deserialize)]
struct LoginResponse {
    token: String,
}

impl PasswordLogin {
    /// Tokens issued by the backend are valid for 24 h; refresh an hour early.
    pub const DEFAULT_TTL: Duration = Duration::from_secs(23 * 3600);

    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            username: username.into(),
            password: password.into(),
            ttl: Self::DEFAULT_TTL,
            cached: tokio::sync::RwLock::new(None),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    async fn do_login(&self) -> Result<CachedToken, ApiError> {
        let url = format!("{}/api/login", self.base_url);
        debug!(user = %self.username, "logging in");
        let resp = self
            .http
            .post(&url)
            .json(&serde_json::json!({
                "username": self.username,
                "password": self.password,
            }))
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::Auth(format!(
                "login failed ({status}): {}",
                error_message(status, &body)
            )));
        }

        let lr: LoginResponse = resp
            .json()
            .await
            .map_err(|e| ApiError::Decode(format!("login response: {e}")))?;

        let expires_at = chrono::Utc::now().timestamp() + self.ttl.as_secs() as i64;
        Ok(CachedToken {
            token: lr.token,
            expires_at,
        })
    }
}

#[async_trait::async_trait]
impl TokenSource for PasswordLogin {
    async fn token(&self) -> Result<Option<String>, ApiError> {
        // Fast path: read lock, check cache.
        {
            let guard = self.cached.read().await;
            if let Some(ref cached) = *guard {
                if chrono::Utc::now().timestamp() < cached.expires_at {
                    return Ok(Some(cached.token.clone()));
                }
            }
        }

        // Slow path: write lock, re-check, login.
        let mut guard = self.cached.write().await;
        if let Some(ref cached) = *guard {
            if chrono::Utc::now().timestamp() < cached.expires_at {
                return Ok(Some(cached.token.clone()));
            }
        }

        let fresh = self.do_login().await?;
        let token = fresh.token.clone();
        *guard = Some(fresh);
        Ok(Some(token))
    }
}

// ── ApiClient ───────────────────────────────────────────────────────

/// JSON client bound to one backend base URL.
///
/// Paths passed to the request methods are joined onto the base URL,
/// e.g. `"/api/inspections"` or `"/api/comments/inspection/7"`.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token_source: Arc<dyn TokenSource>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, token_source: Arc<dyn TokenSource>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token_source,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for a path relative to the base.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Build a request with auth header.
    async fn authed(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder, ApiError> {
        match self.token_source.token().await? {
            Some(token) => Ok(builder.bearer_auth(token)),
            None => Ok(builder),
        }
    }

    /// Fail non-2xx responses with the backend's message.
    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let code = status.as_u16();
        let body = resp.text().await.unwrap_or_default();
        Err(ApiError::Server {
            status: code,
            message: error_message(code, &body),
        })
    }

    /// Parse an API response, mapping HTTP errors to `ApiError`.
    async fn parse<R: DeserializeOwned>(resp: reqwest::Response) -> Result<R, ApiError> {
        let resp = Self::check(resp).await?;
        resp.json::<R>()
            .await
            .map_err(|e| ApiError::Decode(format!("response body: {e}")))
    }

    pub async fn get_json<R: DeserializeOwned>(&self, path: &str) -> Result<R, ApiError> {
        debug!(path, "GET");
        let req = self.authed(self.http.get(self.url(path))).await?;
        Self::parse(req.send().await?).await
    }

    pub async fn post_json<B: Serialize + Sync, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, ApiError> {
        debug!(path, "POST");
        let req = self.authed(self.http.post(self.url(path)).json(body)).await?;
        Self::parse(req.send().await?).await
    }

    pub async fn put_json<B: Serialize + Sync, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, ApiError> {
        debug!(path, "PUT");
        let req = self.authed(self.http.put(self.url(path)).json(body)).await?;
        Self::parse(req.send().await?).await
    }

    /// DELETE; the response body is ignored.
    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        debug!(path, "DELETE");
        let req = self.authed(self.http.delete(self.url(path))).await?;
        Self::check(req.send().await?).await?;
        Ok(())
    }
}
