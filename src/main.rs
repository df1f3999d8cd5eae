//! Secure listener server.
//!
//! ```text
//!     Client ──▶ TcpAcceptor ──▶ RateLimitedListener ──▶ ProtocolDetectingListener
//!                                 (per-IP buckets,        (peek first byte,
//!                                  whitelist, eviction)    log TLS / non-TLS)
//!                                                                   │
//!                                                                   ▼
//!                                 HttpServer ◀── TlsAcceptor (optional, monitored)
//!                                 (axum Router, GET /health)
//! ```

use std::path::{Path, PathBuf};

use axum::{routing::get, Router};
use clap::Parser;

use secure_listener::config::{load_config, AppConfig};
use secure_listener::lifecycle::{shutdown_on_signal, Shutdown};
use secure_listener::observability::init_tracing;
use secure_listener::security::check_certificate_expiry;
use secure_listener::{new_secure_listener, HttpServer, TcpAcceptor, TlsAcceptor};

#[derive(Parser)]
#[command(name = "secure-listener")]
#[command(about = "Rate-limited, protocol-aware HTTP listener", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

async fn health() -> &'static str {
    "ok"
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };

    init_tracing(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "secure-listener starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        tls = config.listener.tls.is_some(),
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    let tls = match &config.listener.tls {
        Some(tls) => {
            let (cert, key) = (Path::new(&tls.cert_path), Path::new(&tls.key_path));
            check_certificate_expiry(cert, key)?;
            Some(TlsAcceptor::from_pem_files(cert, key)?)
        }
        None => None,
    };

    let acceptor = TcpAcceptor::bind(&config.listener).await?;
    let listener = new_secure_listener(acceptor, Some(&config.security));

    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    tokio::spawn(shutdown_on_signal(shutdown));

    let router = Router::new().route("/health", get(health));
    HttpServer::new(router, tls, config.timeouts.clone())
        .run(listener, receiver)
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
