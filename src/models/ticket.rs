use super::wager::BetStatus;
use crate::odds::{MarketTerms, Side};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Combination (parlay) ticket settled as one unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComboTicket {
    pub id: Uuid,
    pub account_id: Uuid,
    pub stake: Decimal,
    pub status: BetStatus,
    pub multiplier: Option<Decimal>,
    pub payout: Decimal,
    pub settled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    /// Ordered by position
    pub legs: Vec<TicketLeg>,
}

/// One match selection inside a combination ticket
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketLeg {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub position: i32,
    pub match_id: String,
    pub terms: MarketTerms,
    pub status: BetStatus,
    pub settled_at: Option<DateTime<Utc>>,
}

impl ComboTicket {
    pub fn pending_legs(&self) -> usize {
        self.legs.iter().filter(|leg| leg.status.is_pending()).count()
    }
}

/// `combo_tickets` row as stored
#[derive(Debug, Clone, FromRow)]
pub struct ComboTicketRow {
    pub id: Uuid,
    pub account_id: Uuid,
    pub stake: Decimal,
    pub status: String,
    pub multiplier: Option<Decimal>,
    pub payout: Decimal,
    pub settled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// `ticket_legs` row as stored
#[derive(Debug, Clone, FromRow)]
pub struct TicketLegRow {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub position: i32,
    pub match_id: String,
    pub pick: String,
    pub favorite: String,
    pub handicap_line: Decimal,
    pub price: i32,
    pub status: String,
    pub settled_at: Option<DateTime<Utc>>,
}

impl TryFrom<TicketLegRow> for TicketLeg {
    type Error = String;

    fn try_from(row: TicketLegRow) -> Result<Self, Self::Error> {
        let pick = row.pick.parse::<Side>().map_err(|e| e.to_string())?;
        let favorite = row.favorite.parse::<Side>().map_err(|e| e.to_string())?;

        Ok(Self {
            id: row.id,
            ticket_id: row.ticket_id,
            position: row.position,
            match_id: row.match_id,
            terms: MarketTerms {
                pick,
                favorite,
                line: row.handicap_line,
                price: row.price,
            },
            status: BetStatus::from_str(&row.status)?,
            settled_at: row.settled_at,
        })
    }
}

impl ComboTicket {
    /// Assemble a ticket from its row and already-decoded legs
    pub fn from_parts(row: ComboTicketRow, mut legs: Vec<TicketLeg>) -> Result<Self, String> {
        legs.sort_by_key(|leg| leg.position);

        Ok(Self {
            id: row.id,
            account_id: row.account_id,
            stake: row.stake,
            status: BetStatus::from_str(&row.status)?,
            multiplier: row.multiplier,
            payout: row.payout,
            settled_at: row.settled_at,
            created_at: row.created_at,
            legs,
        })
    }
}
