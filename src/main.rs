use std::time::Duration;

use snippetrooms::{app, config::Config, AppState};
use tracing_subscriber::EnvFilter;

const PRUNE_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("snippetrooms=debug,tower_http=debug")),
        )
        .init();

    let config = Config::from_env()?;
    let state = AppState::from_config(&config).await;
    if !state.ai.enabled() {
        tracing::warn!("OPENAI_API_KEY not set; /api/ask-ai is disabled");
    }

    let hub = state.hub.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PRUNE_INTERVAL);
        loop {
            interval.tick().await;
            let pruned = hub.prune();
            if pruned > 0 {
                tracing::debug!("pruned {pruned} idle room channels");
            }
        }
    });

    let app = app(state, &config.public_dir);
    let addr = config.addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("server running on {addr}");
    axum::serve(listener, app).await?;

    Ok(())
}
