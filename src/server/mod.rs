// src/server/mod.rs

//! HTTP API.
//!
//! | route | handler |
//! |---|---|
//! | `GET /`, `GET /health` | service banner and liveness |
//! | `GET /api/products[/:id]` | search and fetch with resolved image URLs |
//! | `POST /api/upload` | multipart PDF ingest |
//! | `GET /api/sessions`, `DELETE /api/sessions/:id` | ingest session management |
//! | `GET /assets/*key` | object passthrough for the local backend |

pub mod error;
pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use sqlx::SqlitePool;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::database::{self, ProductRepository, SessionRepository};
use crate::error::Result;
use crate::models::Config;
use crate::pipeline::Ingestor;
use crate::storage::{ObjectStore, build_store};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub products: ProductRepository,
    pub sessions: SessionRepository,
    pub store: Arc<dyn ObjectStore>,
    pub ingestor: Arc<Ingestor>,
}

impl AppState {
    /// Assemble state from an open pool and a ready store.
    pub fn new(config: Config, pool: SqlitePool, store: Arc<dyn ObjectStore>) -> Result<Self> {
        let ingestor = Ingestor::new(&config, store.clone(), pool.clone())?;
        Ok(Self {
            config: Arc::new(config),
            products: ProductRepository::new(pool.clone()),
            sessions: SessionRepository::new(pool),
            store,
            ingestor: Arc::new(ingestor),
        })
    }

    /// Connect the database, run migrations and prepare the object store.
    pub async fn connect(config: Config) -> Result<Self> {
        let pool = database::connect(&config.database).await?;
        let store = build_store(&config.storage).await?;
        store.ensure_ready().await?;
        tracing::info!(storage = %store.describe(), "object store ready");
        Self::new(config, pool, store)
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let upload_limit = state.config.server.max_upload_mb * 1024 * 1024;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/api/products", get(handlers::list_products))
        .route("/api/products/:id", get(handlers::get_product))
        .route(
            "/api/upload",
            post(handlers::upload).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/sessions", get(handlers::list_sessions))
        .route("/api/sessions/:id", delete(handlers::delete_session))
        .route("/assets/*key", get(handlers::get_asset))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Run the API until Ctrl-C.
pub async fn serve(config: Config) -> Result<()> {
    let addr = config.server.bind_addr();
    let state = AppState::connect(config).await?;
    let app = router(state);

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
    }
}
