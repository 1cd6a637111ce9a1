//! HTTP front-end: serves the submission form and forwards each submitted
//! message to the shared [`Publisher`].

use domain::topic::Publisher;
use log::*;
use service::config::Config;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;

mod controller;
mod error;
mod params;
pub mod router;

pub use error::{Error, Result};

/// State shared by all request handlers. The publisher is constructed once at
/// startup and only ever read afterwards.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub publisher: Arc<dyn Publisher>,
}

impl AppState {
    pub fn new(config: Config, publisher: Arc<dyn Publisher>) -> Self {
        Self { config, publisher }
    }
}

/// Binds the configured interface and port and serves requests until `shutdown`
/// completes, normally [`shutdown_signal`].
pub async fn init_server<F>(app_state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let address = format!(
        "{}:{}",
        app_state.config.interface(),
        app_state.config.port
    );
    let listener = TcpListener::bind(&address).await?;

    info!(
        "Listening on {address}, publishing to {}",
        app_state.publisher.topic_name()
    );

    axum::serve(listener, router::define_routes(app_state))
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Completes when the process receives SIGINT or SIGTERM. The handlers are
/// installed on first poll.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!("Failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
