pub mod config;
pub mod controllers;
pub mod database;
pub mod error;
pub mod middleware;
pub mod models;
pub mod services;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use services::uploads::{ImageStore, MAX_IMAGE_BYTES, PUBLIC_PREFIX};

// Shared state for every request
#[derive(Clone)]
pub struct AppState {
    pub db: database::Database,
    pub config: config::Config,
    pub images: ImageStore,
}

impl AppState {
    /// Connects, migrates and seeds the admin account.
    pub async fn new(config: config::Config) -> anyhow::Result<Arc<Self>> {
        let db = database::Database::new(&config.database.url, config.database.pool_size).await?;
        tracing::info!("Database connected");

        db.run_migrations().await?;
        services::seed::seed_admin(&db, &config.seed).await?;

        Ok(Arc::new(Self::with_database(db, config)))
    }

    pub fn with_database(db: database::Database, config: config::Config) -> Self {
        let images = ImageStore::new(&config.app.upload_dir);
        Self { db, config, images }
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Event Buddy API v1.0" }))
        .route("/health", get(|| async { "OK" }))
        .nest("/api", controllers::routes())
        .nest_service(PUBLIC_PREFIX, ServeDir::new(state.images.dir()))
        .layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES + 1024 * 1024))
        .layer(cors_layer(&state.config.app.cors_origin))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::HEAD,
            Method::PUT,
            Method::PATCH,
            Method::POST,
            Method::DELETE,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true);

    match HeaderValue::from_str(origin) {
        Ok(origin) => layer.allow_origin(origin),
        Err(_) => {
            tracing::warn!("CORS_ORIGIN '{}' is not a valid header value, cross-origin requests disabled", origin);
            layer
        }
    }
}
