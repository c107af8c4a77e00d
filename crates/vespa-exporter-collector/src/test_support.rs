use std::{net::SocketAddr, time::Duration};

use axum::Router;
use tokio::net::TcpListener;

use crate::config::ExporterConfig;

pub(crate) async fn serve(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind test listener");
    let addr = listener.local_addr().expect("failed to read local_addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    addr
}

pub(crate) async fn unused_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind ephemeral port");
    let port = listener
        .local_addr()
        .expect("failed to read local_addr")
        .port();
    drop(listener);
    port
}

pub(crate) fn test_config(config_server: String) -> ExporterConfig {
    ExporterConfig {
        config_server,
        request_timeout: Duration::from_secs(2),
        interval: Duration::from_millis(100),
        ..ExporterConfig::default()
    }
}

pub(crate) fn test_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()
        .expect("failed to build test client")
}
