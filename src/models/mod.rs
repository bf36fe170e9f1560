//! Domain models for the settlement engine.
//!
//! Wagers and combination tickets are written in `pending` by the placement
//! flow; everything after that transition is owned by settlement.

pub mod account;
pub mod match_result;
pub mod ticket;
pub mod wager;

// Re-export all models for convenient access
pub use account::{Account, LedgerEntry, LedgerEntryType};
pub use match_result::{MatchResult, ResultsSnapshot};
pub use ticket::{ComboTicket, ComboTicketRow, TicketLeg, TicketLegRow};
pub use wager::{BetStatus, Wager, WagerRow};
