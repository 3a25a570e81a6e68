//! Wire layer underneath [`ApiClient`](super::ApiClient).
//!
//! The session credential lives in a cookie jar owned by the transport. The
//! client only decides whether a request carries credentials; it never sees
//! cookie values.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::redirect::Policy;
use reqwest::{header, Client, Method, Response, StatusCode, Url};
use serde_json::Value;
use tracing::debug;

use super::ClientError;
use crate::config::ClientConfig;

/// Redirect hops followed before giving up.
const MAX_REDIRECTS: usize = 10;

/// One attempt at an upstream call.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
    pub with_credentials: bool,
}

/// Upstream response with the body already read.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, content_type: Option<&str>, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: content_type.map(str::to_string),
            body: body.into(),
        }
    }

    pub fn json(status: u16, body: &Value) -> Self {
        Self::new(status, Some("application/json"), body.to_string())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_json(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| ct.to_ascii_lowercase().contains("json"))
            .unwrap_or(false)
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform a single request. Only failures to complete the exchange are
    /// errors; any status code is returned as a response.
    async fn send(&self, request: &ApiRequest) -> Result<RawResponse, ClientError>;
}

/// reqwest-backed transport with its own cookie jar.
/// Clone is cheap - the client and jar are both shared.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
    jar: Arc<Jar>,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        // Redirects are followed in `send` so every hop's Set-Cookie reaches the jar.
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .redirect(Policy::none())
            .build()?;

        Url::parse(&config.base_url)
            .map_err(|e| ClientError::InvalidRequest(format!("base URL {}: {}", config.base_url, e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            jar: Arc::new(Jar::default()),
        })
    }

    fn url_for(&self, path: &str) -> Result<Url, ClientError> {
        let joined = if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        };
        Url::parse(&joined).map_err(|e| ClientError::InvalidRequest(format!("{}: {}", joined, e)))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &ApiRequest) -> Result<RawResponse, ClientError> {
        let mut url = self.url_for(&request.path)?;
        let mut method = request.method.clone();
        let mut body = request.body.as_ref();
        let mut hops = 0;

        let response = loop {
            let mut builder = self
                .client
                .request(method.clone(), url.clone())
                .header(header::ACCEPT, "application/json");

            if request.with_credentials {
                if let Some(cookie) = self.jar.cookies(&url) {
                    builder = builder.header(header::COOKIE, cookie);
                }
            }
            if let Some(body) = body {
                builder = builder.json(body);
            }

            let response = builder.send().await?;

            // Rotated credentials are kept even on error and redirect responses.
            {
                let mut set_cookies = response.headers().get_all(header::SET_COOKIE).iter();
                self.jar.set_cookies(&mut set_cookies, response.url());
            }

            let Some(next) = redirect_target(&response) else {
                break response;
            };
            if hops == MAX_REDIRECTS {
                return Err(ClientError::InvalidResponse(format!(
                    "too many redirects for {}",
                    request.path
                )));
            }
            hops += 1;

            let status = response.status();
            if status == StatusCode::SEE_OTHER
                || (method == Method::POST
                    && matches!(status, StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND))
            {
                method = Method::GET;
                body = None;
            }
            debug!(path = %request.path, status = status.as_u16(), location = %next, "Following redirect");
            url = next;
        };

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await?;

        debug!(method = %request.method, path = %request.path, status, "Upstream response");

        Ok(RawResponse {
            status,
            content_type,
            body,
        })
    }
}

/// Where a 3xx response points, resolved against the URL that produced it.
fn redirect_target(response: &Response) -> Option<Url> {
    if !response.status().is_redirection() {
        return None;
    }
    let location = response.headers().get(header::LOCATION)?.to_str().ok()?;
    response.url().join(location).ok()
}
