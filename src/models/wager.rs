use crate::odds::{MarketTerms, Outcome, Side};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Lifecycle status shared by wagers, combination legs and tickets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BetStatus {
    Pending,
    Win,
    WinHalf,
    Draw,
    LoseHalf,
    Loss,
}

impl BetStatus {
    /// Convert from database string
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(BetStatus::Pending),
            "win" => Ok(BetStatus::Win),
            "win_half" => Ok(BetStatus::WinHalf),
            "draw" => Ok(BetStatus::Draw),
            "lose_half" => Ok(BetStatus::LoseHalf),
            "loss" => Ok(BetStatus::Loss),
            _ => Err(format!("Invalid status: {}", s)),
        }
    }

    /// Convert to database string
    pub fn as_str(&self) -> &'static str {
        match self {
            BetStatus::Pending => "pending",
            BetStatus::Win => "win",
            BetStatus::WinHalf => "win_half",
            BetStatus::Draw => "draw",
            BetStatus::LoseHalf => "lose_half",
            BetStatus::Loss => "loss",
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, BetStatus::Pending)
    }

    /// Settled outcome, `None` while pending
    pub fn outcome(&self) -> Option<Outcome> {
        match self {
            BetStatus::Pending => None,
            BetStatus::Win => Some(Outcome::Win),
            BetStatus::WinHalf => Some(Outcome::WinHalf),
            BetStatus::Draw => Some(Outcome::Draw),
            BetStatus::LoseHalf => Some(Outcome::LoseHalf),
            BetStatus::Loss => Some(Outcome::Loss),
        }
    }
}

impl From<Outcome> for BetStatus {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Win => BetStatus::Win,
            Outcome::WinHalf => BetStatus::WinHalf,
            Outcome::Draw => BetStatus::Draw,
            Outcome::LoseHalf => BetStatus::LoseHalf,
            Outcome::Loss => BetStatus::Loss,
        }
    }
}

impl std::fmt::Display for BetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Single-leg wager
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wager {
    pub id: Uuid,
    pub account_id: Uuid,
    pub match_id: String,
    pub terms: MarketTerms,
    pub stake: Decimal,
    pub status: BetStatus,
    pub payout: Decimal,
    pub settled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// `wagers` row as stored
#[derive(Debug, Clone, FromRow)]
pub struct WagerRow {
    pub id: Uuid,
    pub account_id: Uuid,
    pub match_id: String,
    pub pick: String,
    pub favorite: String,
    pub handicap_line: Decimal,
    pub price: i32,
    pub stake: Decimal,
    pub status: String,
    pub payout: Decimal,
    pub settled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<WagerRow> for Wager {
    type Error = String;

    fn try_from(row: WagerRow) -> Result<Self, Self::Error> {
        let pick = row.pick.parse::<Side>().map_err(|e| e.to_string())?;
        let favorite = row.favorite.parse::<Side>().map_err(|e| e.to_string())?;

        Ok(Self {
            id: row.id,
            account_id: row.account_id,
            match_id: row.match_id,
            terms: MarketTerms {
                pick,
                favorite,
                line: row.handicap_line,
                price: row.price,
            },
            stake: row.stake,
            status: BetStatus::from_str(&row.status)?,
            payout: row.payout,
            settled_at: row.settled_at,
            created_at: row.created_at,
        })
    }
}
