//! Wager Settlement Service
//!
//! Main entry point for the settlement engine. This service:
//! - fetches final scores from the results feed every cycle
//! - settles pending single wagers and combination tickets
//! - accepts an on-demand cycle on SIGUSR1
//!
//! `--once` runs a single cycle synchronously and exits.

use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use wager_settlement::config::AppConfig;
use wager_settlement::database::{create_pool, run_migrations};
use wager_settlement::error::{AppError, AppResult};
use wager_settlement::services::{
    AuditTrailService, CycleRun, HttpResultsGateway, SettlementScheduler, SettlementService,
};
use wager_settlement::AppState;

fn init_tracing(config: &AppConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("wager_settlement={},sqlx=warn", config.log_level).into()
    });

    if config.json_logs() {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Load environment variables first
    dotenv::dotenv().ok();

    let run_once = std::env::args().skip(1).any(|arg| arg == "--once");

    // Load configuration
    let config = AppConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        AppError::Config(e)
    })?;

    init_tracing(&config);

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║           Wager Settlement Service Starting               ║");
    info!("╚══════════════════════════════════════════════════════════╝");
    info!("Environment: {}", config.environment);
    info!("Log level: {}", config.log_level);
    info!("Results feed: {}", config.settlement.results_url);

    // =========================================================================
    // DATABASE SETUP
    // =========================================================================
    info!("Connecting to database...");

    let pool = create_pool(&config.database).await.map_err(|e| {
        error!("Failed to create database pool: {}", e);
        AppError::Database(e)
    })?;

    info!("Database connection pool created successfully");
    info!("Max connections: {}", config.database.max_connections);

    info!("Running database migrations...");
    run_migrations(&pool).await.map_err(|e| {
        error!("Database migration failed: {}", e);
        AppError::Database(e)
    })?;

    info!("Database migrations completed successfully");

    // =========================================================================
    // SETTLEMENT ENGINE
    // =========================================================================
    let app_state = AppState::new(pool);
    info!("✓ Application state initialized with repositories");

    let gateway = Arc::new(HttpResultsGateway::new(&config.settlement)?);
    info!(
        "✓ Results gateway initialized (timeout {:?}, {} retries)",
        config.settlement.request_timeout(),
        config.settlement.fetch_retries
    );

    let audit_trail = Arc::new(
        AuditTrailService::new(PathBuf::from(&config.settlement.audit_log_dir)).map_err(|e| {
            error!("Failed to initialize audit trail: {}", e);
            AppError::Message(format!("Audit trail initialization failed: {}", e))
        })?,
    );
    info!("✓ Audit trail service initialized");

    let service = Arc::new(
        SettlementService::new(
            app_state.settlement_store(),
            gateway,
            config.settlement.max_concurrency,
        )
        .with_audit(audit_trail),
    );
    let scheduler = Arc::new(SettlementScheduler::new(service, config.settlement.interval()));
    info!("✓ Settlement service initialized");

    if run_once {
        info!("Running a single settlement cycle (--once)");
        return match scheduler.run_cycle_once().await {
            CycleRun::Completed(report) => {
                info!("Settlement cycle complete: {:?}", report);
                Ok(())
            }
            CycleRun::Aborted(e) => Err(e),
            CycleRun::AlreadyRunning => Ok(()),
        };
    }

    // =========================================================================
    // BACKGROUND TASKS
    // =========================================================================
    let scheduler_handle = tokio::spawn(scheduler.clone().start());
    info!(
        "✓ Settlement scheduler started ({}s interval)",
        config.settlement.interval_secs
    );

    let trigger_handle = spawn_trigger_listener(scheduler.clone());

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║           Wager Settlement Service Ready!                 ║");
    info!("╚══════════════════════════════════════════════════════════╝");
    info!("Press Ctrl+C to shutdown gracefully");

    // =========================================================================
    // SHUTDOWN HANDLING
    // =========================================================================
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received, shutting down gracefully...");
        }
        _ = scheduler_handle => {
            error!("Settlement scheduler exited unexpectedly");
        }
        _ = trigger_handle => {
            warn!("On-demand trigger listener exited");
            // Keep serving on the interval alone
            tokio::signal::ctrl_c().await.ok();
        }
    }

    // A cycle killed here resumes safely on the next start
    if scheduler.is_running() {
        warn!("Shutting down during a settlement cycle; unsettled units stay pending");
    }

    info!("Wager settlement service shutdown complete");
    Ok(())
}

/// Run an on-demand cycle on every SIGUSR1
#[cfg(unix)]
fn spawn_trigger_listener(scheduler: Arc<SettlementScheduler>) -> tokio::task::JoinHandle<()> {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async move {
        let mut signals = match signal(SignalKind::user_defined1()) {
            Ok(signals) => signals,
            Err(e) => {
                warn!("Could not install SIGUSR1 handler: {}", e);
                return;
            }
        };

        info!("✓ On-demand trigger listening on SIGUSR1");
        while signals.recv().await.is_some() {
            info!("SIGUSR1 received: {:?}", scheduler.trigger());
        }
    })
}

#[cfg(not(unix))]
fn spawn_trigger_listener(_scheduler: Arc<SettlementScheduler>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(futures::future::pending::<()>())
}
