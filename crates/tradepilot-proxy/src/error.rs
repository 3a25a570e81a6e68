use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("Upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("Invalid upstream URL: {0}")]
    InvalidUpstream(String),
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        match self {
            ProxyError::Upstream(_) => (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "message": "Upstream service unavailable" })),
            )
                .into_response(),
            ProxyError::InvalidUpstream(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "message": "Proxy misconfigured" })),
            )
                .into_response(),
        }
    }
}
