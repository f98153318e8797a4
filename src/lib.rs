//! Picturesque - REST API backend for a photo-sharing application
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      API Layer (Axum)                        │
//! │  - Accounts, posts, collections, authors, titles            │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Service Layer                            │
//! │  - Post ingestion workflow                                  │
//! │  - Recommendation engine                                    │
//! │  - Accounts, collections                                    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Data & Gateways                         │
//! │  - SQLite (sqlx)                                            │
//! │  - R2 media storage                                         │
//! │  - Nominatim geocoder                                       │
//! │  - Token revocation store                                   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `api`: HTTP handlers
//! - `service`: Business logic layer
//! - `data`: Database layer
//! - `storage`: Cloudflare R2 media storage
//! - `geo`: Nominatim geocoding
//! - `auth`: Token issuance, verification, revocation
//! - `config`: Configuration management
//! - `error`: Error types

pub mod api;
pub mod auth;
pub mod config;
pub mod data;
pub mod error;
pub mod geo;
pub mod metrics;
pub mod service;
pub mod storage;

use std::sync::Arc;

use crate::geo::GeocodingGateway;
use crate::storage::MediaGateway;

/// Maximum accepted request body (covers the photo upload)
pub const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

/// Application state shared across all handlers
///
/// This struct is cloned for each request and contains shared
/// resources like the database pool, gateways, and the token
/// revocation store.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Database connection pool
    pub db: Arc<data::Database>,

    /// Media storage (Cloudflare R2)
    pub storage: Arc<dyn MediaGateway>,

    /// Geocoder (Nominatim)
    pub geocoder: Arc<dyn GeocodingGateway>,

    /// Revoked token ids (volatile, TTL-expired)
    pub revoked_tokens: Arc<auth::RevocationStore>,
}

impl AppState {
    /// Initialize application state with the real gateways
    ///
    /// # Steps
    /// 1. Connect to the SQLite database (runs migrations)
    /// 2. Connect to R2 storage
    /// 3. Build the Nominatim client
    ///
    /// # Errors
    /// Returns error if any initialization step fails
    pub async fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        let storage =
            storage::MediaStorage::new(&config.storage.media, &config.cloudflare).await?;
        tracing::info!("Media storage initialized");

        let geocoder = geo::NominatimGeocoder::new(&config.geocoder)?;
        tracing::info!("Geocoder initialized");

        Self::with_gateways(config, Arc::new(storage), Arc::new(geocoder)).await
    }

    /// Initialize application state with caller-provided gateways
    ///
    /// Used by tests to substitute in-memory media/geocoder fakes.
    pub async fn with_gateways(
        config: config::AppConfig,
        storage: Arc<dyn MediaGateway>,
        geocoder: Arc<dyn GeocodingGateway>,
    ) -> Result<Self, error::AppError> {
        let db = data::Database::connect(&config.database.path).await?;

        Ok(Self {
            config: Arc::new(config),
            db: Arc::new(db),
            storage,
            geocoder,
            revoked_tokens: Arc::new(auth::RevocationStore::new()),
        })
    }

    /// Account service bound to this state
    pub fn accounts(&self) -> service::AccountService {
        service::AccountService::new(
            self.db.clone(),
            self.revoked_tokens.clone(),
            self.config.auth.clone(),
        )
    }

    /// Post ingestion service bound to this state
    pub fn posts(&self) -> service::PostService {
        service::PostService::new(self.db.clone(), self.storage.clone(), self.geocoder.clone())
    }

    /// Collection service bound to this state
    pub fn collections(&self) -> service::CollectionService {
        service::CollectionService::new(self.db.clone())
    }

    /// Recommendation service bound to this state
    pub fn recommendations(&self) -> service::RecommendationService {
        service::RecommendationService::new(self.db.clone())
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::Router;
    use axum::extract::DefaultBodyLimit;
    use tower_http::{compression::CompressionLayer, trace::TraceLayer};

    let cors_layer = build_cors_layer(&state.config.server);

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .merge(api::users_router())
        .merge(api::posts_router())
        .merge(api::collections_router())
        .merge(api::authors_router())
        .merge(api::titles_router())
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
        .merge(api::metrics_router())
}

fn build_cors_layer(server: &config::ServerConfig) -> tower_http::cors::CorsLayer {
    use axum::http::HeaderValue;
    use tower_http::cors::{Any, CorsLayer};

    if !server.protocol.eq_ignore_ascii_case("https") {
        return CorsLayer::permissive();
    }

    let allowed_origin = server.base_url();
    match HeaderValue::from_str(&allowed_origin) {
        Ok(origin) => CorsLayer::new()
            .allow_origin([origin])
            .allow_methods(Any)
            .allow_headers(Any),
        Err(error) => {
            tracing::error!(
                %error,
                origin = %allowed_origin,
                "Failed to parse CORS origin from server base URL; denying cross-origin requests"
            );
            CorsLayer::new().allow_methods(Any).allow_headers(Any)
        }
    }
}

async fn health_check() -> &'static str {
    "OK"
}
