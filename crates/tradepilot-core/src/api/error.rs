use std::collections::BTreeMap;

use serde_json::Value;
use thiserror::Error;

/// Field name to validation messages, as returned by the backend.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Status reported by every authentication failure.
pub const AUTH_FAILURE_STATUS: u16 = 401;

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

const DEFAULT_AUTH_MESSAGE: &str = "Authentication required";

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    #[error("{message}")]
    Request {
        message: String,
        status: Option<u16>,
        errors: Option<FieldErrors>,
    },

    #[error("Network error: {0}")]
    Network(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Network(Box::new(err))
    }
}

impl ClientError {
    /// Build an authentication error from a rejected response body.
    pub fn authentication(body: &str) -> Self {
        let message = parse_body(body)
            .as_ref()
            .and_then(extract_message)
            .unwrap_or_else(|| DEFAULT_AUTH_MESSAGE.to_string());
        ClientError::Authentication { message }
    }

    /// Build the general error for any other non-success response.
    pub fn from_status(status: u16, body: &str) -> Self {
        let parsed = parse_body(body);
        let message = parsed
            .as_ref()
            .and_then(extract_message)
            .unwrap_or_else(|| fallback_message(status, body));
        let errors = parsed.as_ref().and_then(extract_field_errors);
        ClientError::Request {
            message,
            status: Some(status),
            errors,
        }
    }

    pub fn network<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        ClientError::Network(Box::new(err))
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Authentication { .. } => Some(AUTH_FAILURE_STATUS),
            ClientError::Request { status, .. } => *status,
            ClientError::Network(_)
            | ClientError::InvalidRequest(_)
            | ClientError::InvalidResponse(_) => None,
        }
    }

    pub fn errors(&self) -> Option<&FieldErrors> {
        match self {
            ClientError::Request { errors, .. } => errors.as_ref(),
            _ => None,
        }
    }

    /// Human-readable message without the variant prefix.
    pub fn message(&self) -> String {
        match self {
            ClientError::Authentication { message } | ClientError::Request { message, .. } => {
                message.clone()
            }
            other => other.to_string(),
        }
    }

    pub fn is_authentication(&self) -> bool {
        matches!(self, ClientError::Authentication { .. })
    }

    /// True when the server could not be reached at all.
    pub fn is_network(&self) -> bool {
        matches!(self, ClientError::Network(_))
    }
}

fn parse_body(body: &str) -> Option<Value> {
    if body.trim().is_empty() {
        return None;
    }
    serde_json::from_str(body).ok()
}

/// Best-effort message lookup, checked in order: `message`, first element of
/// an array `message`, `error`, `detail` as a string, then the first `msg`
/// of an array `detail`.
pub fn extract_message(body: &Value) -> Option<String> {
    let obj = body.as_object()?;

    match obj.get("message") {
        Some(Value::String(s)) if !s.is_empty() => return Some(s.clone()),
        Some(Value::Array(items)) => {
            if let Some(Value::String(first)) = items.first() {
                return Some(first.clone());
            }
        }
        _ => {}
    }

    if let Some(Value::String(s)) = obj.get("error") {
        if !s.is_empty() {
            return Some(s.clone());
        }
    }

    match obj.get("detail") {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Array(items)) => items.iter().find_map(|item| match item {
            Value::Object(detail) => detail.get("msg").and_then(Value::as_str).map(str::to_string),
            Value::String(s) => Some(s.clone()),
            _ => None,
        }),
        _ => None,
    }
}

/// Pull the `errors` object into a field map. Single string values are
/// promoted to one-element lists.
pub fn extract_field_errors(body: &Value) -> Option<FieldErrors> {
    let errors = body.get("errors")?.as_object()?;

    let map: FieldErrors = errors
        .iter()
        .filter_map(|(field, value)| {
            let messages = match value {
                Value::String(s) => vec![s.clone()],
                Value::Array(items) => items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect(),
                _ => return None,
            };
            Some((field.clone(), messages))
        })
        .collect();

    if map.is_empty() {
        None
    } else {
        Some(map)
    }
}

fn fallback_message(status: u16, body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() || trimmed.starts_with('{') || trimmed.starts_with('[') {
        format!("Request failed with status {}", status)
    } else {
        truncate_body(trimmed)
    }
}

/// Truncate a response body to avoid logging excessive data
fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY_LENGTH {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY_LENGTH;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_field_wins_over_error() {
        let body = json!({ "message": "Insufficient balance", "error": "Bad Request" });
        assert_eq!(extract_message(&body).as_deref(), Some("Insufficient balance"));
    }

    #[test]
    fn test_array_message_uses_first_element() {
        let body = json!({ "message": ["amount must be positive", "currency is required"] });
        assert_eq!(extract_message(&body).as_deref(), Some("amount must be positive"));
    }

    #[test]
    fn test_error_then_detail_fallbacks() {
        assert_eq!(
            extract_message(&json!({ "error": "Wallet locked" })).as_deref(),
            Some("Wallet locked")
        );
        assert_eq!(
            extract_message(&json!({ "detail": "Not found" })).as_deref(),
            Some("Not found")
        );
        assert_eq!(
            extract_message(&json!({ "detail": [{ "loc": ["body", "email"], "msg": "field required" }] }))
                .as_deref(),
            Some("field required")
        );
        assert_eq!(extract_message(&json!({ "unrelated": true })), None);
        assert_eq!(extract_message(&json!(["not", "an", "object"])), None);
    }

    #[test]
    fn test_from_status_collects_field_errors() {
        let err = ClientError::from_status(400, r#"{"errors": {"email": ["is invalid"], "name": "is blank"}}"#);
        assert_eq!(err.status(), Some(400));
        let errors = err.errors().expect("field errors");
        assert_eq!(errors["email"][0], "is invalid");
        assert_eq!(errors["name"], vec!["is blank".to_string()]);
        assert_eq!(err.message(), "Request failed with status 400");
    }

    #[test]
    fn test_from_status_plain_text_body() {
        let err = ClientError::from_status(502, "Bad Gateway");
        assert_eq!(err.message(), "Bad Gateway");
        assert!(err.errors().is_none());

        let long = "x".repeat(MAX_ERROR_BODY_LENGTH + 20);
        let err = ClientError::from_status(500, &long);
        assert!(err.message().contains("truncated"));
    }

    #[test]
    fn test_authentication_error_status_and_message() {
        let err = ClientError::authentication(r#"{"message": "Session expired"}"#);
        assert!(err.is_authentication());
        assert_eq!(err.status(), Some(AUTH_FAILURE_STATUS));
        assert_eq!(err.message(), "Session expired");

        let err = ClientError::authentication("");
        assert_eq!(err.message(), DEFAULT_AUTH_MESSAGE);
    }

    #[test]
    fn test_network_error_has_no_status() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused");
        let err = ClientError::network(io);
        assert!(err.is_network());
        assert_eq!(err.status(), None);
        assert!(err.to_string().contains("connection refused"));
    }
}
