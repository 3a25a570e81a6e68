//! Core library for the TradePilot dashboard.
//!
//! - `api`: the session-aware `ApiClient`, its error taxonomy and transport
//! - `auth`: typed wrappers for the login/register/logout/me endpoints
//! - `config`: client settings loaded from disk and the environment

pub mod api;
pub mod auth;
pub mod config;

pub use api::{ApiClient, ClientError, ParsedBody, RequestOptions};
pub use auth::AuthApi;
pub use config::ClientConfig;
