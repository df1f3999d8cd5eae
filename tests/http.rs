//! Plain HTTP served through the secure listener.

use axum::routing::get;
use axum::Router;
use secure_listener::config::TimeoutConfig;
use secure_listener::{HttpServer, Shutdown};

mod common;

#[tokio::test]
async fn health_over_plain_http() {
    let (listener, addr) = common::bind_secure(None).await;
    let shutdown = Shutdown::new();
    let router = Router::new().route("/health", get(|| async { "ok" }));
    let server = tokio::spawn(
        HttpServer::new(router, None, TimeoutConfig::default()).run(listener, shutdown.subscribe()),
    );

    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    let response = client
        .get(format!("http://{addr}/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "ok");

    drop(client);
    shutdown.trigger();
    assert!(server.await.unwrap().is_ok());
}

#[tokio::test]
async fn listener_close_stops_server_with_error() {
    let (listener, _) = common::bind_secure(None).await;
    let handle = listener.close_handle();
    let shutdown = Shutdown::new();
    let router = Router::new().route("/health", get(|| async { "ok" }));
    let server = tokio::spawn(
        HttpServer::new(router, None, TimeoutConfig::default()).run(listener, shutdown.subscribe()),
    );

    handle.close();
    assert!(server.await.unwrap().is_err());
}
