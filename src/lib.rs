pub mod api;
pub mod config;
pub mod core_state;
pub mod db;
pub mod ledger;
pub mod models;
pub mod report;

use std::sync::Arc;
use tracing_subscriber::EnvFilter;

pub fn run() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    if let Err(e) = serve() {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}

fn serve() -> Result<(), String> {
    let config = config::AppConfig::from_env().map_err(|e| e.to_string())?;
    let core = Arc::new(
        core_state::CoreState::new(&config)
            .map_err(|e| format!("Cannot open report database: {e}"))?,
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("Cannot start async runtime: {e}"))?;

    runtime.block_on(async move {
        let server = api::start_api_server(core, config.bind_addr).await?;
        tracing::info!(addr = %server.session.server_addr, "Listening");

        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Cannot listen for shutdown signal: {e}");
        }
        server.stop().await;
        Ok::<(), String>(())
    })
}
