use streamchat::config::ChatConfig;
use streamchat::{routes, state};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ChatConfig::from_env().expect("invalid configuration");
    let port = config.port;
    tracing::info!(
        streaming = config.streaming_enabled,
        keepalive_secs = config.keepalive.as_secs(),
        snapshot_limit = config.snapshot_limit,
        "chat configured"
    );

    let state = state::AppState::new(config);
    let shutdown = state.shutdown.clone();

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "streamchat listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .expect("server failed");
}

/// Wait for Ctrl-C, then cancel every live stream so responses can finish.
async fn shutdown_signal(token: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    tracing::info!("shutdown requested, closing streams");
    token.cancel();
}
