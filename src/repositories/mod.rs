pub mod account_repository;
pub mod ledger_repository;
pub mod settlement_store;
pub mod ticket_repository;
pub mod wager_repository;

// Re-export all repositories for convenient access
pub use account_repository::AccountRepository;
pub use ledger_repository::{LedgerRepository, NewLedgerEntry};
pub use settlement_store::{
    PgSettlementStore, SettleOutcome, SettlementStore, TicketSettlement, WagerSettlement,
};
pub use ticket_repository::{NewLeg, TicketRepository};
pub use wager_repository::WagerRepository;
