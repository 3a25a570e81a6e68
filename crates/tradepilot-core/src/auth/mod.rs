//! Authentication module for the dashboard's session endpoints.
//!
//! This module provides:
//! - `AuthApi`: login, register, logout and current-user calls on top of
//!   `ApiClient`, each with the session handling its endpoint needs
//!
//! The session itself is an HTTP-only cookie and is never read here.

pub mod session;

pub use session::{AuthApi, Credentials, Registration, SessionUser};
