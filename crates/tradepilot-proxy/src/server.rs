//! Pass-through proxy routes using axum.
//!
//! Each request under the configured prefix is forwarded to the same path on
//! the backend. Status, body and every `Set-Cookie` come back untouched so the
//! session cookie round-trips exactly as the backend issued it.

use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderName, Method, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use axum::Router;
use reqwest::redirect::Policy;
use reqwest::{Client, Url};
use tracing::{debug, warn};

use crate::config::ProxyConfig;
use crate::error::ProxyError;

/// Inbound headers copied to the backend.
static FORWARDED_REQUEST_HEADERS: [HeaderName; 4] = [
    header::COOKIE,
    header::CONTENT_TYPE,
    header::ACCEPT,
    header::AUTHORIZATION,
];

/// Backend headers copied to the caller.
static RELAYED_RESPONSE_HEADERS: [HeaderName; 4] = [
    header::SET_COOKIE,
    header::CONTENT_TYPE,
    header::CACHE_CONTROL,
    header::LOCATION,
];

/// Shared state for the proxy handlers.
/// Clone is cheap - reqwest::Client uses Arc internally.
#[derive(Clone)]
pub struct ProxyState {
    client: Client,
    upstream: String,
    prefix: String,
}

impl ProxyState {
    pub fn new(config: &ProxyConfig) -> Result<Self, ProxyError> {
        Url::parse(&config.upstream_url)
            .map_err(|e| ProxyError::InvalidUpstream(format!("{}: {}", config.upstream_url, e)))?;

        // No cookie store and no redirects: both belong to the browser.
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .redirect(Policy::none())
            .build()?;

        Ok(Self {
            client,
            upstream: config.upstream_url.trim_end_matches('/').to_string(),
            prefix: config.normalized_prefix(),
        })
    }

    /// Inbound path with the proxy prefix removed. Percent-escapes are kept
    /// as received so `%2F` and `%3F` stay inside their segment.
    fn upstream_path<'a>(&self, raw_path: &'a str) -> &'a str {
        raw_path
            .strip_prefix(self.prefix.as_str())
            .filter(|rest| rest.is_empty() || rest.starts_with('/'))
            .unwrap_or(raw_path)
    }

    fn upstream_url(&self, path: &str, query: Option<&str>) -> String {
        let path = path.trim_start_matches('/');
        match query {
            Some(q) if !q.is_empty() => format!("{}/{}?{}", self.upstream, path, q),
            _ => format!("{}/{}", self.upstream, path),
        }
    }

    async fn forward(
        &self,
        method: Method,
        path: &str,
        query: Option<&str>,
        headers: &HeaderMap,
        body: Bytes,
    ) -> Result<Response, ProxyError> {
        let url = self.upstream_url(path, query);

        let mut outbound = HeaderMap::new();
        for name in FORWARDED_REQUEST_HEADERS.iter() {
            for value in headers.get_all(name) {
                outbound.append(name.clone(), value.clone());
            }
        }

        let mut builder = self.client.request(method.clone(), &url).headers(outbound);
        if !body.is_empty() {
            builder = builder.body(body);
        }

        let upstream = builder.send().await.map_err(|e| {
            warn!(%method, path, error = %e, "Upstream request failed");
            ProxyError::from(e)
        })?;

        let status = upstream.status();
        let mut relayed = HeaderMap::new();
        for name in RELAYED_RESPONSE_HEADERS.iter() {
            for value in upstream.headers().get_all(name) {
                relayed.append(name.clone(), value.clone());
            }
        }
        let bytes = upstream.bytes().await?;

        debug!(%method, path, status = status.as_u16(), "Proxied request");

        let mut response = Response::new(Body::from(bytes));
        *response.status_mut() = status;
        *response.headers_mut() = relayed;
        Ok(response)
    }
}

/// Build the router: `GET /healthz` plus every method under `prefix`.
pub fn create_router(mut state: ProxyState, prefix: &str) -> Router {
    state.prefix = prefix.to_string();
    Router::new()
        .route("/healthz", get(healthz))
        .route(&format!("{}/{{*path}}", prefix), any(forward))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn forward(
    State(state): State<ProxyState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = state.upstream_path(uri.path());
    match state.forward(method, path, uri.query(), &headers, body).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}
