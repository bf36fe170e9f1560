//! Account balance and payout ledger models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Bettor account holding the credit balance
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub username: String,
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Kinds of ledger entry produced by settlement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerEntryType {
    WagerPayout,
    TicketPayout,
}

impl LedgerEntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WagerPayout => "wager_payout",
            Self::TicketPayout => "ticket_payout",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "wager_payout" => Some(Self::WagerPayout),
            "ticket_payout" => Some(Self::TicketPayout),
            _ => None,
        }
    }
}

/// Append-only record of one payout credited to an account
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub account_id: Uuid,
    pub wager_id: Option<Uuid>,
    pub ticket_id: Option<Uuid>,
    pub entry_type: String,
    pub amount: Decimal,
    pub balance_after: Decimal,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn kind(&self) -> Option<LedgerEntryType> {
        LedgerEntryType::from_str(&self.entry_type)
    }

    /// Wager or ticket the payout belongs to
    pub fn source_id(&self) -> Option<Uuid> {
        self.wager_id.or(self.ticket_id)
    }
}
