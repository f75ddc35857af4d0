//! sessionwatch daemon
//!
//! Runs a session tracker behind a local HTTP/WebSocket API so a UI can
//! forward activity, show the countdown and react to warning and expiry.

use sessionwatch::activity::{ActivityHub, ActivitySource};
use sessionwatch::config::TimeoutConfig;
use sessionwatch::controller::SessionController;
use sessionwatch::database::Database;
use sessionwatch::server::{self, state::AppState};
use sessionwatch::tracker::SessionTracker;
use std::sync::Arc;
use tokio::sync::{broadcast, Notify};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("sessionwatch=info")),
        )
        .init();

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run_application())
}

async fn run_application() -> Result<(), Box<dyn std::error::Error>> {
    println!("╔════════════════════════════════════════════════════════════╗");
    println!("║           sessionwatch - Inactivity Tracker                ║");
    println!("╚════════════════════════════════════════════════════════════╝");
    println!();

    println!("🔧 Opening settings database...");
    let database = match Database::open() {
        Ok(db) => {
            println!("   ✓ Database ready");
            Some(Arc::new(db))
        }
        Err(e) => {
            tracing::error!(?e, "Failed to open database, running with defaults");
            println!("   ⚠ Database unavailable, using default settings");
            None
        }
    };

    let config = match &database {
        Some(db) => TimeoutConfig::from_database(db)?,
        None => TimeoutConfig::default(),
    };

    let port = database
        .as_ref()
        .and_then(|db| db.get_config("server_port").ok().flatten())
        .and_then(|v| v.parse::<u16>().ok())
        .unwrap_or(server::DEFAULT_PORT);

    let hub = Arc::new(ActivityHub::new());
    let source: Arc<dyn ActivitySource> = hub.clone();
    let tracker = SessionTracker::new(config, source);

    let (broadcast_tx, _) = broadcast::channel::<String>(100);
    let (controller, events_rx) =
        SessionController::new(tracker, database.clone(), broadcast_tx.clone());
    tokio::spawn(Arc::clone(&controller).run(events_rx));

    let state = Arc::new(AppState::new(
        broadcast_tx,
        Arc::clone(&controller),
        hub,
        database,
    ));

    println!("🔧 Starting HTTP server...");
    let server_handle = tokio::spawn(server::run_server(state, port));

    // Shutdown signal
    let shutdown = Arc::new(Notify::new());
    let shutdown_ctrlc = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        println!("\n🛑 Shutdown signal received...");
        shutdown_ctrlc.notify_one();
    })?;

    controller.login();

    println!();
    println!("════════════════════════════════════════════════════════════════");
    println!(
        "🎯 Session armed: expires after {} min of inactivity, warning {} min before",
        config.timeout().as_secs() / 60,
        config.warning_lead_minutes()
    );
    println!("🌐 API available at http://127.0.0.1:{}", port);
    println!("   • GET  /api/session          - Remaining time and phase");
    println!("   • POST /api/session/activity - Report user activity");
    println!("   • POST /api/session/login    - Start a new session");
    println!("   • POST /api/session/logout   - End the session");
    println!("   • WS   /ws                   - Warning/expiry notifications");
    println!("════════════════════════════════════════════════════════════════");
    println!();

    tokio::select! {
        _ = shutdown.notified() => {}
        result = server_handle => {
            match result {
                Ok(Err(e)) => tracing::error!(?e, "HTTP server failed"),
                Err(e) => tracing::error!(?e, "HTTP server task panicked"),
                Ok(Ok(())) => tracing::info!("HTTP server exited"),
            }
        }
    }

    println!("\n⏳ Shutting down...");
    controller.tracker().stop();

    println!("👋 sessionwatch has exited. Goodbye!");
    Ok(())
}
