//! HTTP API for recipebox.
//!
//! The router is generic over the store so handler tests run against
//! [`recipebox::MemoryStore`]; the binary wires it to [`recipebox::PgStore`].

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use recipebox::{Catalog, PgStore, RecipeStore};
use tokio::net::TcpListener;
use tokio::signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tower_http::trace::TraceLayer;
use tracing::info;

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;

use auth::TokenVerifier;

/// Shared by every handler.
pub struct AppState<S> {
    pub store: Arc<S>,
    pub catalog: Catalog<S>,
    pub verifier: Arc<dyn TokenVerifier>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            catalog: self.catalog.clone(),
            verifier: Arc::clone(&self.verifier),
        }
    }
}

impl<S: RecipeStore> AppState<S> {
    pub fn new(store: Arc<S>, verifier: Arc<dyn TokenVerifier>) -> Self {
        Self {
            catalog: Catalog::new(Arc::clone(&store)),
            store,
            verifier,
        }
    }
}

pub fn router<S: RecipeStore>(state: AppState<S>) -> Router {
    use routes::{catalog, favorites, health, recipes};

    Router::new()
        .route("/api/recipes/public", get(catalog::list_public::<S>))
        .route("/api/recipes/categories", get(catalog::categories::<S>))
        .route(
            "/api/recipes",
            get(recipes::list_own::<S>).post(recipes::create::<S>),
        )
        .route(
            "/api/recipes/{id}",
            get(recipes::show::<S>).delete(recipes::delete::<S>),
        )
        .route("/api/recipes/{id}/publish", post(recipes::publish::<S>))
        .route("/api/recipes/{id}/unpublish", post(recipes::unpublish::<S>))
        .route("/api/recipes/{id}/like", post(recipes::like::<S>))
        .route("/api/recipes/{id}/favorite", post(recipes::favorite::<S>))
        .route("/api/recipes/{id}/views", post(recipes::record_view::<S>))
        .route("/api/favorites", get(favorites::list::<S>))
        .route("/api/health", get(health::check::<S>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until SIGINT/SIGTERM, then drain and close the pool.
pub async fn serve(
    store: Arc<PgStore>,
    verifier: Arc<dyn TokenVerifier>,
    bind: SocketAddr,
) -> std::io::Result<()> {
    let app = router(AppState::new(Arc::clone(&store), verifier));

    let listener = TcpListener::bind(bind).await?;
    info!("Server running on {}", listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    store.close();
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(err) => {
                tracing::error!(error = %err, "Failed to install Ctrl+C handler");
                std::future::pending::<()>().await;
            }
        }
    };

    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
