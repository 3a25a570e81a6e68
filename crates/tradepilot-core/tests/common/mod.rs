//! Shared utilities for integration testing against a mock backend.

use std::net::SocketAddr;

use axum::http::{header, HeaderMap};
use axum::Router;
use tokio::net::TcpListener;

/// Serve `router` on an ephemeral localhost port.
pub async fn spawn_upstream(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });

    addr
}

/// Value of the named cookie in the request's `Cookie` header.
#[allow(dead_code)]
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}
