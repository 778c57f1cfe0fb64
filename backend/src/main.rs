mod config;
mod error;
mod routes;
mod state;

use tracing_subscriber::EnvFilter;

use config::ServerConfig;
use state::AppState;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cfg = ServerConfig::from_env();
    let addr = cfg.addr();
    tracing::info!(
        asset = %cfg.default_asset,
        zone = %cfg.zone,
        zone_name = %cfg.zone_name,
        timeout_secs = cfg.quote_timeout.as_secs(),
        "configuration loaded"
    );

    let state = match AppState::from_config(cfg) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("failed to build quote client: {e}");
            std::process::exit(1);
        }
    };

    let app = routes::router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("bind listen address");
    tracing::info!("chart server listening on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server failed");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for Ctrl+C: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received, stopping");
}
