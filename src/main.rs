//! Switchboard - menu-driven chat service
//!
//! Threads inbound chat messages through a configurable menu tree, with an
//! in-chat admin wizard that edits the same configuration.

mod admin;
mod analytics;
mod api;
mod config;
mod identity;
mod menu;
mod runtime;
mod session;
mod state_machine;
mod transport;

use analytics::JsonFileAnalytics;
use api::{create_router, AppState};
use config::{JsonFileConfigStore, Settings};
use identity::{FileAliasStore, IdentityResolver};
use runtime::{Runtime, Services, Transport};
use session::TokioScheduler;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use transport::{LogTransport, WebhookTransport};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "switchboard=info,tower_http=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let settings = Settings::from_env();
    tracing::info!(
        menu = %settings.menu_path.display(),
        analytics = %settings.analytics_path.display(),
        aliases = %settings.alias_dir.display(),
        "Loaded settings"
    );
    if settings.superadmin.is_empty() {
        tracing::warn!("No superadmin configured. Set SWITCHBOARD_SUPERADMIN.");
    }

    let transport: Arc<dyn Transport> = match &settings.outbound_url {
        Some(url) => {
            tracing::info!(url = %url, "Delivering outbound messages through webhook");
            Arc::new(WebhookTransport::new(url.clone())?)
        }
        None => {
            tracing::warn!("No outbound URL configured; outbound messages are only logged");
            Arc::new(LogTransport)
        }
    };
    let analytics = Arc::new(JsonFileAnalytics::new(settings.analytics_path.clone()));
    let services = Services {
        transport,
        config: Arc::new(JsonFileConfigStore::new(settings.menu_path.clone())),
        analytics: analytics.clone(),
        resolver: IdentityResolver::new(Arc::new(FileAliasStore::new(settings.alias_dir.clone()))),
        scheduler: Arc::new(TokioScheduler),
    };

    // Dispatch runtime
    let (runtime, handle) = Runtime::new(services, &settings);
    let cancel = CancellationToken::new();
    let worker = tokio::spawn(runtime.run(cancel.clone()));

    // Create router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let app = create_router(AppState::new(handle, analytics))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
    tracing::info!("Switchboard listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let shutdown = cancel.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => tracing::info!("Shutdown requested"),
                Err(e) => tracing::error!(error = %e, "Failed to listen for shutdown signal"),
            }
            shutdown.cancel();
        })
        .await?;

    cancel.cancel();
    worker.await?;
    Ok(())
}
