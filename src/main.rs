//! parceldesk - conversational order-tracking backend
//!
//! A Rust backend implementing a per-session conversation state machine
//! over an LLM intent resolver and an order store.

mod api;
mod engine;
mod notify;
mod orders;
mod resolver;
mod session;

use api::{create_router, AppState};
use notify::{NoopNotifier, Notifier, WhatsAppNotifier};
use orders::{OrderDb, OrderStore};
use resolver::{AnthropicResolver, IntentResolver};
use session::SessionStore;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parceldesk=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let db_path = std::env::var("PARCELDESK_DB_PATH").unwrap_or_else(|_| {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
        format!("{home}/.parceldesk/orders.db")
    });

    let port: u16 = std::env::var("PARCELDESK_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8000);

    // Ensure database directory exists
    if let Some(parent) = PathBuf::from(&db_path).parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Order store
    tracing::info!(path = %db_path, "Opening order database");
    let orders: Arc<dyn OrderStore> = Arc::new(OrderDb::open(&db_path)?);

    // Intent resolver
    let resolver: Arc<dyn IntentResolver> = match std::env::var("ANTHROPIC_API_KEY") {
        Ok(key) => {
            tracing::info!("Intent resolver initialized");
            Arc::new(AnthropicResolver::new(key))
        }
        Err(_) => {
            // Without a key every resolver call fails closed and the
            // engine answers with its fallback reply.
            tracing::warn!("ANTHROPIC_API_KEY not set; intent resolution will be degraded");
            Arc::new(AnthropicResolver::new(String::new()))
        }
    };

    // Notifier
    let notifier: Arc<dyn Notifier> = match std::env::var("WHATSAPP_WEBHOOK_URL") {
        Ok(url) => Arc::new(WhatsAppNotifier::new(url)),
        Err(_) => {
            tracing::warn!("WHATSAPP_WEBHOOK_URL not set; notifications are logged and dropped");
            Arc::new(NoopNotifier)
        }
    };

    // Session store + background expiry sweep
    let sessions = Arc::new(SessionStore::new());
    let _sweeper = sessions.spawn_sweeper();

    // Create application state
    let state = AppState::new(sessions, resolver, orders, notifier);

    // Create router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let compression = CompressionLayer::new()
        .gzip(true)
        .br(true)
        .deflate(true)
        .zstd(true);

    let app = create_router(state)
        .layer(cors)
        .layer(compression)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("parceldesk server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
