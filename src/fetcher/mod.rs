use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::session::Session;
use crate::utils;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to build HTTP client: {source}")]
    Build {
        #[source]
        source: reqwest::Error,
    },

    #[error("request failed: {source}")]
    Request {
        #[source]
        source: reqwest::Error,
    },

    #[error("connection failed: {message}")]
    Connection { message: String },
}

/// The wire underneath [`AuthenticatedFetcher`].
pub trait Transport: Send + Sync {
    fn get(
        &self,
        url: &str,
        bearer: &str,
    ) -> impl Future<Output = Result<HttpResponse, TransportError>> + Send;

    fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> impl Future<Output = Result<HttpResponse, TransportError>> + Send;
}

#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout_seconds: usize) -> Result<Self, TransportError> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static(concat!(
                "compliance-reports/",
                env!("CARGO_PKG_VERSION")
            )),
        );
        let timeout = Duration::from_secs(timeout_seconds.try_into().unwrap_or(10));
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|source| TransportError::Build { source })?;
        Ok(Self { client })
    }

    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn read(resp: reqwest::Response) -> Result<HttpResponse, TransportError> {
        let status = resp.status().as_u16();
        let body = resp
            .bytes()
            .await
            .map_err(|source| TransportError::Request { source })?;
        Ok(HttpResponse {
            status,
            body: body.to_vec(),
        })
    }
}

impl Transport for ReqwestTransport {
    async fn get(&self, url: &str, bearer: &str) -> Result<HttpResponse, TransportError> {
        let resp = self
            .client
            .get(url)
            .bearer_auth(bearer)
            .send()
            .await
            .map_err(|source| TransportError::Request { source })?;
        Self::read(resp).await
    }

    async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<HttpResponse, TransportError> {
        let resp = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|source| TransportError::Request { source })?;
        Self::read(resp).await
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("no access token in session; log in first")]
    MissingAccessToken,

    #[error("unauthorized (401): {url}")]
    Unauthorized { url: String },

    #[error("request to {url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: TransportError,
    },
}

impl FetchError {
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Unauthorized { .. } => Some(401),
            FetchError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenRefreshResponse {
    access: String,
    #[serde(default)]
    refresh: Option<String>,
}

/// Issues bearer-authenticated GETs, refreshing the access token once on a
/// 401 and retrying once with the new token.
///
/// Refreshes are serialized. A caller whose request was rejected while
/// another caller completed a refresh reuses the rotated token instead of
/// spending the refresh token a second time.
pub struct AuthenticatedFetcher<T> {
    transport: T,
    session: Arc<Session>,
    refresh_url: String,
    refresh_lock: Mutex<()>,
    refresh_generation: AtomicU64,
}

impl<T: Transport> AuthenticatedFetcher<T> {
    pub fn new(transport: T, session: Arc<Session>, base_url: &str) -> Self {
        Self {
            transport,
            session,
            refresh_url: utils::api_url(base_url, utils::TOKEN_REFRESH_PATH),
            refresh_lock: Mutex::new(()),
            refresh_generation: AtomicU64::new(0),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn refresh_url(&self) -> &str {
        &self.refresh_url
    }

    /// GET `url` with the session's current access token.
    pub async fn get(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let token = self
            .session
            .access_token()
            .ok_or(FetchError::MissingAccessToken)?;
        self.get_with_token(url, &token).await
    }

    pub async fn get_with_token(&self, url: &str, token: &str) -> Result<Vec<u8>, FetchError> {
        let generation = self.refresh_generation.load(Ordering::Acquire);
        let first = self.attempt(url, token).await;
        if !matches!(first, Err(FetchError::Unauthorized { .. })) {
            return first;
        }

        match self.refresh_since(generation).await {
            Some(new_token) => {
                tracing::debug!(url, "retrying request with refreshed access token");
                self.attempt(url, &new_token).await
            }
            None => first,
        }
    }

    async fn attempt(&self, url: &str, token: &str) -> Result<Vec<u8>, FetchError> {
        let resp = self
            .transport
            .get(url, token)
            .await
            .map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?;
        if resp.is_success() {
            return Ok(resp.body);
        }
        if resp.status == 401 {
            return Err(FetchError::Unauthorized {
                url: url.to_string(),
            });
        }
        Err(FetchError::Status {
            url: url.to_string(),
            status: resp.status,
        })
    }

    async fn refresh_since(&self, generation: u64) -> Option<String> {
        let _guard = self.refresh_lock.lock().await;
        if self.refresh_generation.load(Ordering::Acquire) != generation {
            if let Some(token) = self.session.access_token() {
                return Some(token);
            }
        }
        let token = self.refresh().await;
        if token.is_some() {
            self.refresh_generation.fetch_add(1, Ordering::AcqRel);
        }
        token
    }

    /// Exchanges the stored refresh token for a new access token.
    ///
    /// Returns `None` when there is no refresh token, or when the exchange
    /// fails; in the latter case the session is invalidated.
    pub async fn refresh(&self) -> Option<String> {
        let Some(refresh_token) = self.session.refresh_token() else {
            tracing::debug!("no refresh token in session, skipping refresh");
            return None;
        };

        let body = serde_json::json!({ "refresh": refresh_token });
        let outcome = match self.transport.post_json(&self.refresh_url, &body).await {
            Ok(resp) if resp.is_success() => resp
                .json::<TokenRefreshResponse>()
                .map_err(|e| format!("malformed refresh response: {e}"))
                .and_then(|tokens| {
                    if tokens.access.is_empty() {
                        Err("refresh response carried an empty access token".to_string())
                    } else {
                        Ok(tokens)
                    }
                }),
            Ok(resp) => Err(format!("refresh endpoint returned status {}", resp.status)),
            Err(e) => Err(e.to_string()),
        };

        let outcome = outcome.and_then(|tokens| {
            let rotated = tokens.refresh.is_some();
            self.session
                .rotate(tokens.access.clone(), tokens.refresh)
                .map(|()| (tokens.access, rotated))
                .map_err(|e| e.to_string())
        });

        match outcome {
            Ok((access, rotated)) => {
                tracing::debug!(rotated, "access token refreshed");
                Some(access)
            }
            Err(reason) => {
                tracing::warn!(%reason, "token refresh failed, clearing session");
                if let Err(e) = self.session.invalidate() {
                    tracing::warn!(error = %e, "failed to clear credentials");
                }
                None
            }
        }
    }
}
