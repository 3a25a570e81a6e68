//! Shared utilities for proxy integration tests.

use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;
use tradepilot_proxy::{create_router, ProxyConfig, ProxyState};

/// Serve `router` on an ephemeral localhost port.
pub async fn spawn_upstream(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });

    addr
}

/// Start the proxy with default routes in front of `upstream`.
pub async fn spawn_proxy(upstream: SocketAddr) -> SocketAddr {
    let config = ProxyConfig {
        upstream_url: format!("http://{}", upstream),
        ..ProxyConfig::default()
    };
    let state = ProxyState::new(&config).unwrap();
    spawn_upstream(create_router(state, &config.normalized_prefix())).await
}
