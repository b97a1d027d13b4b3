//! `ch-graphite-gw` — main entry point.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use ch_graphite_gw::api::{self, AppState};
use ch_graphite_gw::config::Config;
use ch_graphite_gw::rollup::RollupRules;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ch_graphite_gw=info,tower_http=info".into()),
        )
        .init();

    let config_path = Config::resolve_path();
    let config = Config::from_file(&config_path)
        .with_context(|| format!("loading configuration from {config_path}"))?;

    let rollup_rules = RollupRules::compile(&config.rollup.rules)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path,
        "starting ch-graphite-gw"
    );

    let listen = config.common.listen.clone();
    let state = AppState::new(config, rollup_rules);
    let app = api::create_router(state);

    let addr: SocketAddr = listen
        .parse()
        .with_context(|| format!("invalid listen address {listen:?}"))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, "listening");

    let shutdown_signal = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install CTRL+C signal handler");
        info!("received shutdown signal");
    };

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal).await?;

    info!("shutdown complete");
    Ok(())
}
