// src/main.rs

use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use tonebridge::api;
use tonebridge::config::CONFIG;
use tonebridge::state::create_app_state;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(CONFIG.log_level.clone()));
    fmt().with_env_filter(filter).init();

    info!("Starting tonebridge");
    info!(
        parser_enabled = CONFIG.parser_enabled,
        parser_base_url = %CONFIG.parser_base_url,
        kb_dir = %CONFIG.kb_dir,
        "Configuration loaded"
    );

    let state = Arc::new(create_app_state(&CONFIG));
    let app = api::router(state);

    let bind_address = CONFIG.bind_address();
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!("Listening on http://{}", bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
