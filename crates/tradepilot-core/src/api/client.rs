//! Session-aware API client for the TradePilot backend.
//!
//! Every data call from the dashboard goes through `ApiClient`. It carries the
//! session cookie, recovers from an expired session by refreshing once, and
//! turns every failure into a [`ClientError`].

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use reqwest::Method;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{debug, error, warn};

use super::transport::{ApiRequest, HttpTransport, RawResponse, Transport};
use super::ClientError;
use crate::config::ClientConfig;

/// Pending refresh shared by every caller that needs it.
type PendingRefresh = Shared<BoxFuture<'static, bool>>;

/// Per-request switches for the session handling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// Send without credentials and never refresh (login, register, refresh).
    pub skip_auth: bool,
    /// Send with credentials but never refresh (logout).
    pub skip_refresh: bool,
}

impl RequestOptions {
    pub const SKIP_AUTH: Self = Self {
        skip_auth: true,
        skip_refresh: false,
    };

    pub const SKIP_REFRESH: Self = Self {
        skip_auth: false,
        skip_refresh: true,
    };

    fn allows_refresh(&self) -> bool {
        !self.skip_auth && !self.skip_refresh
    }
}

/// Successful response body, decoded by content type.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedBody {
    Json(Value),
    Text(String),
}

impl ParsedBody {
    fn from_response(response: RawResponse) -> Result<Self, ClientError> {
        if !response.is_json() {
            return Ok(ParsedBody::Text(response.body));
        }
        if response.body.trim().is_empty() {
            return Ok(ParsedBody::Json(Value::Null));
        }
        serde_json::from_str(&response.body)
            .map(ParsedBody::Json)
            .map_err(|e| ClientError::InvalidResponse(format!("malformed JSON body: {}", e)))
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ParsedBody::Json(value) => Some(value),
            ParsedBody::Text(_) => None,
        }
    }

    pub fn into_json<T: DeserializeOwned>(self) -> Result<T, ClientError> {
        match self {
            ParsedBody::Json(value) => serde_json::from_value(value)
                .map_err(|e| ClientError::InvalidResponse(format!("unexpected body shape: {}", e))),
            ParsedBody::Text(text) => Err(ClientError::InvalidResponse(format!(
                "expected JSON, got text ({} bytes)",
                text.len()
            ))),
        }
    }
}

/// Outcome of the most recent completed refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshRecord {
    pub succeeded: bool,
    pub completed_at: DateTime<Utc>,
}

struct ClientInner {
    transport: Arc<dyn Transport>,
    refresh_path: String,
    refresh_on_forbidden: bool,
    refresh: Mutex<Option<PendingRefresh>>,
    last_refresh: Arc<Mutex<Option<RefreshRecord>>>,
}

/// API client for the TradePilot backend.
/// Clone is cheap - clones share the transport and the refresh state.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

impl ApiClient {
    /// Create a client talking HTTP to `config.base_url`.
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let transport = HttpTransport::new(config)?;
        Ok(Self::with_transport(Arc::new(transport), config))
    }

    /// Create a client on top of any transport.
    pub fn with_transport(transport: Arc<dyn Transport>, config: &ClientConfig) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                transport,
                refresh_path: config.refresh_path.clone(),
                refresh_on_forbidden: config.refresh_on_forbidden,
                refresh: Mutex::new(None),
                last_refresh: Arc::new(Mutex::new(None)),
            }),
        }
    }

    /// Issue a request, refreshing the session and retrying once if the
    /// upstream rejects the credential.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        options: RequestOptions,
    ) -> Result<ParsedBody, ClientError> {
        let request = ApiRequest {
            method,
            path: path.to_string(),
            body,
            with_credentials: !options.skip_auth,
        };
        let mut retried = false;

        loop {
            let response = self.inner.transport.send(&request).await?;

            if response.is_success() {
                return ParsedBody::from_response(response);
            }

            if !self.is_auth_failure(response.status) {
                debug!(method = %request.method, path, status = response.status, "Request rejected");
                return Err(ClientError::from_status(response.status, &response.body));
            }

            if retried || !options.allows_refresh() || self.is_refresh_path(path) {
                return Err(ClientError::authentication(&response.body));
            }

            retried = true;
            if !self.refresh_session().await {
                return Err(ClientError::authentication(&response.body));
            }
            debug!(method = %request.method, path, "Session refreshed, retrying request");
        }
    }

    pub async fn get(&self, path: &str, options: RequestOptions) -> Result<ParsedBody, ClientError> {
        self.request(Method::GET, path, None, options).await
    }

    pub async fn post(
        &self,
        path: &str,
        body: Option<Value>,
        options: RequestOptions,
    ) -> Result<ParsedBody, ClientError> {
        self.request(Method::POST, path, body, options).await
    }

    pub async fn put(
        &self,
        path: &str,
        body: Option<Value>,
        options: RequestOptions,
    ) -> Result<ParsedBody, ClientError> {
        self.request(Method::PUT, path, body, options).await
    }

    pub async fn patch(
        &self,
        path: &str,
        body: Option<Value>,
        options: RequestOptions,
    ) -> Result<ParsedBody, ClientError> {
        self.request(Method::PATCH, path, body, options).await
    }

    pub async fn delete(&self, path: &str, options: RequestOptions) -> Result<ParsedBody, ClientError> {
        self.request(Method::DELETE, path, None, options).await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.get(path, RequestOptions::default()).await?.into_json()
    }

    pub async fn post_json<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let body = to_body(body)?;
        self.post(path, Some(body), RequestOptions::default())
            .await?
            .into_json()
    }

    pub async fn put_json<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let body = to_body(body)?;
        self.put(path, Some(body), RequestOptions::default())
            .await?
            .into_json()
    }

    pub async fn patch_json<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let body = to_body(body)?;
        self.patch(path, Some(body), RequestOptions::default())
            .await?
            .into_json()
    }

    /// Refresh the session, joining a refresh already in flight if there is
    /// one. Returns whether the session was re-established.
    pub async fn refresh_session(&self) -> bool {
        let pending = {
            let mut slot = self.inner.refresh.lock().unwrap_or_else(PoisonError::into_inner);
            match slot.clone() {
                Some(pending) => {
                    debug!("Joining in-flight session refresh");
                    pending
                }
                None => {
                    let pending = self.start_refresh();
                    *slot = Some(pending.clone());
                    pending
                }
            }
        };

        let refreshed = pending.clone().await;

        let mut slot = self.inner.refresh.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|current| current.ptr_eq(&pending)) {
            *slot = None;
        }
        refreshed
    }

    /// Outcome of the last refresh that ran to completion.
    pub fn last_refresh(&self) -> Option<RefreshRecord> {
        *self
            .inner
            .last_refresh
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn refresh_path(&self) -> &str {
        &self.inner.refresh_path
    }

    fn start_refresh(&self) -> PendingRefresh {
        // The future must not hold `inner`, or a pending refresh would keep
        // the client alive through its own slot.
        let transport = Arc::clone(&self.inner.transport);
        let last_refresh = Arc::clone(&self.inner.last_refresh);
        let request = ApiRequest {
            method: Method::POST,
            path: self.inner.refresh_path.clone(),
            body: None,
            with_credentials: true,
        };

        async move {
            let succeeded = match transport.send(&request).await {
                Ok(response) if response.is_success() => {
                    debug!("Session refreshed");
                    true
                }
                Ok(response) if response.status == 401 => {
                    debug!("Refresh rejected, no active session");
                    false
                }
                Ok(response) => {
                    warn!(status = response.status, "Session refresh failed");
                    false
                }
                Err(e) => {
                    error!(error = %e, "Session refresh request failed");
                    false
                }
            };

            *last_refresh.lock().unwrap_or_else(PoisonError::into_inner) = Some(RefreshRecord {
                succeeded,
                completed_at: Utc::now(),
            });
            succeeded
        }
        .boxed()
        .shared()
    }

    fn is_auth_failure(&self, status: u16) -> bool {
        status == 401 || (self.inner.refresh_on_forbidden && status == 403)
    }

    fn is_refresh_path(&self, path: &str) -> bool {
        let path = path.split('?').next().unwrap_or(path);
        path.trim_end_matches('/') == self.inner.refresh_path.trim_end_matches('/')
    }
}

fn to_body<B: Serialize>(body: &B) -> Result<Value, ClientError> {
    serde_json::to_value(body)
        .map_err(|e| ClientError::InvalidRequest(format!("failed to serialize body: {}", e)))
}

// ============================================================================
// Tests
// ============================================================================
