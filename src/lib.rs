//! Wager Settlement Library
//!
//! Settles handicap wagers and combination tickets priced with Burmese odds
//! against final match results. Exposed for the binary and for tests.

pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod odds;
pub mod repositories;
pub mod services;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{AppError, AppResult};

use database::Database;
use repositories::*;
use std::sync::Arc;

/// Application state containing all repositories
pub struct AppState {
    pub database: Database,
    pub account_repo: Arc<AccountRepository>,
    pub ledger_repo: Arc<LedgerRepository>,
    pub wager_repo: Arc<WagerRepository>,
    pub ticket_repo: Arc<TicketRepository>,
}

impl AppState {
    /// Create a new AppState with initialized repositories
    pub fn new(pool: sqlx::PgPool) -> Self {
        let database = Database::new(pool.clone());

        Self {
            database,
            account_repo: Arc::new(AccountRepository::new(pool.clone())),
            ledger_repo: Arc::new(LedgerRepository::new(pool.clone())),
            wager_repo: Arc::new(WagerRepository::new(pool.clone())),
            ticket_repo: Arc::new(TicketRepository::new(pool)),
        }
    }

    /// Settlement store sharing this state's pool and repositories
    pub fn settlement_store(&self) -> Arc<dyn SettlementStore> {
        Arc::new(PgSettlementStore::new(
            self.database.pool().clone(),
            self.wager_repo.clone(),
            self.ticket_repo.clone(),
        ))
    }
}
