pub mod ai;
pub mod appresult;
pub mod config;
pub mod rooms;
pub mod status;
pub mod store;

use std::path::Path;

use axum::{extract::FromRef, routing::{get, post}, Router};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

pub use appresult::{AppError, AppResult};
use config::Config;
use rooms::hub::Hub;
use store::RoomStore;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub store: RoomStore,
    pub hub: Hub,
    pub ai: ai::AiClient,
}

impl AppState {
    pub async fn from_config(config: &Config) -> AppState {
        AppState {
            store: RoomStore::from_database_url(config.database_url.as_deref()).await,
            hub: Hub::default(),
            ai: ai::AiClient::new(config.ai.clone()),
        }
    }
}

/// The whole HTTP surface. Unknown paths fall through to the static client in `public_dir`.
pub fn app(state: AppState, public_dir: &Path) -> Router {
    let api = rooms::router()
        .route("/ask-ai", post(ai::ask_ai))
        .route("/status", get(status::status));

    Router::new()
        .route("/health", get(status::health))
        .route("/ws", get(rooms::ws::room_ws))
        .nest("/api", api)
        .fallback_service(ServeDir::new(public_dir))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
