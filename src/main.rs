//! SignalRoom - Membership-Gated Trading-Signal Chat Backend
//! Mission: Real-time room-scoped messaging with durability-before-delivery
//!
//! One process serves the account/room/history HTTP API, the per-room
//! WebSocket chat engine, and the shared-secret bridge that injects
//! external trading signals into chat.

use anyhow::{Context, Result};
use dotenv::dotenv;
use signalroom_backend::{
    api::{create_router, AppState},
    auth::{AuthGate, JwtHandler, UserStore},
    chat::{ConnectionRegistry, MessagePipeline, MessageStore, PresenceTracker},
    config::AppConfig,
    rooms::RoomStore,
    signal::SignalIngestor,
};
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    load_env();
    init_tracing();

    info!("🚀 SignalRoom backend starting");

    let config = Arc::new(AppConfig::from_env());

    // Stores share one SQLite file; each holds its own connection.
    let users = Arc::new(UserStore::new(&config.db_path)?);
    let rooms = Arc::new(RoomStore::new(&config.db_path)?);
    let messages = Arc::new(MessageStore::new(&config.db_path)?);
    info!("📊 Database initialized at: {}", config.db_path);

    // First-start seed data: the admin account and the default room set.
    users.seed_admin(&config.admin_phone, &config.admin_password, &config.admin_name)?;
    rooms.seed_defaults()?;

    let jwt = Arc::new(JwtHandler::new(config.jwt_secret.clone()));
    let gate = Arc::new(AuthGate::new(users.clone(), jwt.clone()));

    let registry = Arc::new(ConnectionRegistry::new());
    let presence = Arc::new(PresenceTracker::new());
    let pipeline = Arc::new(MessagePipeline::new(
        gate.clone(),
        messages.clone(),
        registry.clone(),
    ));

    if config.signal_api_key.is_empty() {
        warn!("⚠️  SIGNAL_API_KEY not set - the signal bridge will reject every call");
    }
    let ingestor = Arc::new(SignalIngestor::new(
        config.signal_api_key.clone(),
        config.signal_room_id,
        config.signal_sender_phone.clone(),
        users.clone(),
        rooms.clone(),
        pipeline.clone(),
    ));

    let state = AppState {
        config: config.clone(),
        users,
        rooms,
        messages,
        jwt,
        gate,
        registry,
        presence,
        pipeline,
        ingestor,
    };

    let app = create_router(state);

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!("🎯 API server listening on {}", config.bind_addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

/// Initialize tracing with env-filter support
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "signalroom_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_env() {
    // Standard dotenv search (cwd + parents), plus the crate directory
    // when running with --manifest-path from elsewhere.
    let _ = dotenv();

    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    let candidates = [manifest_dir.join(".env"), manifest_dir.join("../.env")];

    for p in candidates {
        if p.exists() {
            let _ = dotenv::from_path(&p);
        }
    }
}
