//! Telemetry Sink - local receiver for neoGrid EM payloads
//!
//! Prints every POST body to stdout (pretty-printed when it is JSON) and
//! answers GET with a status line. Useful for bench runs without the
//! collection backend.
//!
//! ```bash
//! ./telemetry-sink --addr 0.0.0.0:8000
//! ```

use anyhow::Context;
use axum::body::Bytes;
use axum::http::{Method, StatusCode};
use axum::Router;
use clap::Parser;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "telemetry-sink", about = "Print neoGrid EM telemetry POSTs")]
struct CliArgs {
    /// Listen address
    #[arg(long, default_value = "0.0.0.0:8000")]
    addr: String,
}

#[derive(Default)]
struct SinkState {
    received: AtomicU64,
}

async fn handle(
    axum::extract::State(state): axum::extract::State<Arc<SinkState>>,
    method: Method,
    body: Bytes,
) -> (StatusCode, &'static str) {
    match method {
        Method::POST => {
            let n = state.received.fetch_add(1, Ordering::Relaxed) + 1;
            let text = match serde_json::from_slice::<serde_json::Value>(&body) {
                Ok(json) => serde_json::to_string_pretty(&json)
                    .unwrap_or_else(|_| String::from_utf8_lossy(&body).into_owned()),
                Err(_) => {
                    warn!(bytes = body.len(), "POST body is not JSON");
                    String::from_utf8_lossy(&body).into_owned()
                }
            };
            println!("Received POST #{n}:\n{text}");
            (StatusCode::OK, "POST received")
        }
        Method::GET => (StatusCode::OK, "Telemetry sink is running"),
        _ => (StatusCode::METHOD_NOT_ALLOWED, "Unsupported method"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();
    let state = Arc::new(SinkState::default());

    let app = Router::new()
        .fallback(handle)
        .with_state(Arc::clone(&state))
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&args.addr)
        .await
        .with_context(|| format!("Failed to bind to {}", args.addr))?;
    info!("✓ Telemetry sink listening on {}", args.addr);

    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("🛑 Received Ctrl+C, shutting down");
        shutdown_token.cancel();
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel_token.cancelled().await })
        .await
        .context("Telemetry sink server error")?;

    info!(
        received = state.received.load(Ordering::Relaxed),
        "✓ Telemetry sink stopped"
    );
    Ok(())
}
