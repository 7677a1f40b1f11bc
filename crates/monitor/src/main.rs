//! `trashtracker-monitor` -- desktop bin monitoring daemon.
//!
//! Runs the threshold coordinator against an in-memory bin store and a
//! small fill-level simulator, raising OS notifications as bins cross
//! their capacity thresholds. Critical alerts additionally go out
//! through the simulated SMS gateway.
//!
//! # Environment variables
//!
//! | Variable                     | Required | Default | Description                         |
//! |------------------------------|----------|---------|-------------------------------------|
//! | `MONITOR_SOURCE`             | no       | `auto`  | Update transport: `auto`, `push`, `poll` |
//! | `MONITOR_POLL_INTERVAL_SECS` | no       | `10`    | Poll period when polling            |
//! | `SIM_STEP_SECS`              | no       | `3`     | Seconds between simulated fill steps |

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use trashtracker_core::{Severity, ThresholdCatalog, CRITICAL_BOUNDARY};
use trashtracker_monitor::coordinator::{Coordinator, MonitorConfig};
use trashtracker_monitor::desktop::DesktopSurface;
use trashtracker_monitor::dispatch::NotificationDispatcher;
use trashtracker_monitor::sms;
use trashtracker_store::{BinStore, MemoryBinStore, SessionProvider, StaticSession, UserSession};

/// Default interval between simulated fill-level steps.
const DEFAULT_SIM_STEP_SECS: u64 = 3;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trashtracker_monitor=info,trashtracker_store=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = MonitorConfig::from_env();
    let sim_step_secs: u64 = std::env::var("SIM_STEP_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_SIM_STEP_SECS);

    tracing::info!(
        source = ?config.source,
        poll_interval_secs = config.poll_interval.as_secs(),
        sim_step_secs,
        "Starting trashtracker-monitor",
    );

    // --- Store ---
    let store = Arc::new(MemoryBinStore::new());
    for name in ["Main entrance", "Cafeteria", "Parking lot"] {
        if let Err(e) = store.create_bin(name).await {
            tracing::error!(error = %e, name, "Failed to seed demo bin");
            std::process::exit(1);
        }
    }
    tracing::info!("Seeded demo bins");

    // --- Session ---
    let session = Arc::new(StaticSession::signed_in(
        UserSession::new("demo-user", "ops@example.com").with_phone_number("+15550100"),
    ));

    // --- Notifications ---
    let dispatcher = Arc::new(NotificationDispatcher::new(Arc::new(DesktopSurface::new())));

    let sms_session = session.clone();
    let coordinator = Coordinator::new(
        store.clone() as Arc<dyn BinStore>,
        ThresholdCatalog::standard(),
        dispatcher.clone(),
    )
    .with_config(config)
    .with_session(session.clone() as Arc<dyn SessionProvider>)
    .on_threshold_crossed(move |alert| {
        if alert.severity == Severity::Critical {
            sms::notify_user_about_bin(
                sms_session.current_user().as_ref(),
                &alert.bin_name,
                alert.level,
            );
        }
    });

    if let Err(e) = coordinator.start().await {
        tracing::error!(error = %e, "Failed to start monitoring");
        std::process::exit(1);
    }

    // Prompts for notification permission up front so the first real
    // alert is not also the first prompt.
    dispatcher.send_test().await;

    // --- Simulator ---
    let sim_cancel = CancellationToken::new();
    let sim_task = tokio::spawn(simulate_fill(
        store.clone() as Arc<dyn BinStore>,
        Duration::from_secs(sim_step_secs),
        sim_cancel.clone(),
    ));

    shutdown_signal().await;

    sim_cancel.cancel();
    if let Err(e) = sim_task.await {
        tracing::error!(error = %e, "Simulator task failed");
    }
    coordinator.stop().await;

    tracing::info!("Graceful shutdown complete");
}

/// Random-walk the fill levels so the pipeline has something to chew on.
///
/// Each step picks one bin and either bumps its level or, once it has
/// reached capacity, empties it.
async fn simulate_fill(store: Arc<dyn BinStore>, step: Duration, cancel: CancellationToken) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(step) => {}
        }

        let bins = match store.list_bins().await {
            Ok(bins) => bins,
            Err(e) => {
                tracing::warn!(error = %e, "Simulator could not list bins");
                continue;
            }
        };
        if bins.is_empty() {
            continue;
        }

        let bin = &bins[rand::random_range(0..bins.len())];
        let next = if bin.fill_level >= CRITICAL_BOUNDARY {
            0.0
        } else {
            bin.fill_level + rand::random_range(8.0..22.0)
        };

        if let Err(e) = store.set_fill_level(bin.id, next).await {
            tracing::warn!(error = %e, bin_id = bin.id, "Simulated update failed");
        }
    }
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the daemon
/// shuts down cleanly whether stopped interactively or by a process
/// manager.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
