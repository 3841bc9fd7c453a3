use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
};

use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::{library, Library, SqliteStore};

mod error;
mod routes;

pub use error::ApiError;

/// Shared handler state: one catalog behind a mutex.
///
/// Store calls block, so handlers run them on the blocking thread pool via
/// [`AppState::run`].
#[derive(Debug, Clone)]
pub struct AppState {
    library: Arc<Mutex<Library<SqliteStore>>>,
}

impl AppState {
    /// Wraps a catalog for sharing between handlers.
    #[must_use]
    pub fn new(library: Library<SqliteStore>) -> Self {
        Self {
            library: Arc::new(Mutex::new(library)),
        }
    }

    async fn run<T, F>(&self, operation: F) -> Result<T, ApiError>
    where
        F: FnOnce(&mut Library<SqliteStore>) -> Result<T, library::Error> + Send + 'static,
        T: Send + 'static,
    {
        let library = Arc::clone(&self.library);
        tokio::task::spawn_blocking(move || {
            let mut guard = library.lock().map_err(|_| ApiError::Poisoned)?;
            operation(&mut guard).map_err(ApiError::from)
        })
        .await?
    }
}

/// Builds the API router over `library`.
pub fn router(library: Library<SqliteStore>) -> Router {
    routes::router()
        .layer(TraceLayer::new_for_http())
        .with_state(AppState::new(library))
}

/// Serves the API on `listen` until interrupted.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn serve(library: Library<SqliteStore>, listen: SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(listen).await?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(library))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
