//! Cookie-preserving proxy routes for the TradePilot dashboard.
//!
//! The dashboard talks to the backend through these routes so the session
//! cookie is same-origin. Requests are relayed verbatim in both directions.

pub mod config;
pub mod error;
pub mod server;

pub use config::ProxyConfig;
pub use error::ProxyError;
pub use server::{create_router, ProxyState};
