//! REST client module for the TradePilot backend.
//!
//! This module provides the `ApiClient` used by every dashboard screen
//! (accounts, wallets, orders, subscriptions, connectivity) to reach the
//! backend, plus the `Transport` seam it sends through.
//!
//! The backend authenticates with an HTTP-only session cookie. The client
//! refreshes that cookie once when it expires and retries the request.

pub mod client;
pub mod error;
pub mod transport;

pub use client::{ApiClient, ParsedBody, RefreshRecord, RequestOptions};
pub use error::{ClientError, FieldErrors};
pub use transport::{ApiRequest, HttpTransport, RawResponse, Transport};
