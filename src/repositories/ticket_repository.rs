use crate::error::RepositoryError;
use crate::models::{BetStatus, ComboTicket, ComboTicketRow, TicketLeg, TicketLegRow};
use crate::odds::MarketTerms;
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use std::collections::HashMap;
use tracing::error;
use uuid::Uuid;

const TICKET_COLUMNS: &str = "id, account_id, stake, status, multiplier, payout, settled_at, created_at";
const LEG_COLUMNS: &str = "id, ticket_id, position, match_id, pick, favorite, handicap_line, price, \
                           status, settled_at";

/// Leg terms for a ticket about to be recorded
#[derive(Debug, Clone)]
pub struct NewLeg {
    pub match_id: String,
    pub terms: MarketTerms,
}

/// Repository for combination tickets and their legs
pub struct TicketRepository {
    pool: PgPool,
}

impl TicketRepository {
    /// Create a new TicketRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a pending ticket with its legs in one transaction
    pub async fn create(
        &self,
        account_id: Uuid,
        stake: Decimal,
        legs: &[NewLeg],
    ) -> Result<ComboTicket, RepositoryError> {
        if legs.is_empty() {
            return Err(RepositoryError::InvalidInput(
                "A combination ticket needs at least one leg".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;

        let ticket = sqlx::query_as::<_, ComboTicketRow>(&format!(
            r#"
            INSERT INTO combo_tickets (account_id, stake)
            VALUES ($1, $2)
            RETURNING {}
            "#,
            TICKET_COLUMNS
        ))
        .bind(account_id)
        .bind(stake)
        .fetch_one(&mut *tx)
        .await?;

        let mut created_legs = Vec::with_capacity(legs.len());
        for (position, leg) in legs.iter().enumerate() {
            let row = sqlx::query_as::<_, TicketLegRow>(&format!(
                r#"
                INSERT INTO ticket_legs (ticket_id, position, match_id, pick, favorite, handicap_line, price)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING {}
                "#,
                LEG_COLUMNS
            ))
            .bind(ticket.id)
            .bind(position as i32)
            .bind(&leg.match_id)
            .bind(leg.terms.pick.as_str())
            .bind(leg.terms.favorite.as_str())
            .bind(leg.terms.line)
            .bind(leg.terms.price)
            .fetch_one(&mut *tx)
            .await?;

            created_legs.push(TicketLeg::try_from(row).map_err(RepositoryError::InvalidInput)?);
        }

        tx.commit().await?;

        ComboTicket::from_parts(ticket, created_legs).map_err(RepositoryError::InvalidInput)
    }

    /// Find a ticket with its legs
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<ComboTicket>, RepositoryError> {
        let row = sqlx::query_as::<_, ComboTicketRow>(&format!(
            "SELECT {} FROM combo_tickets WHERE id = $1",
            TICKET_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let legs = self
            .legs_for(&[row.id])
            .await?
            .into_iter()
            .map(TicketLeg::try_from)
            .collect::<Result<Vec<_>, _>>()
            .map_err(RepositoryError::InvalidInput)?;

        ComboTicket::from_parts(row, legs)
            .map(Some)
            .map_err(RepositoryError::InvalidInput)
    }

    /// Pending tickets with all of their legs. A ticket with any undecodable
    /// leg is skipped: its aggregate cannot be trusted.
    pub async fn find_pending_with_legs(&self) -> Result<Vec<ComboTicket>, RepositoryError> {
        let tickets = sqlx::query_as::<_, ComboTicketRow>(&format!(
            "SELECT {} FROM combo_tickets WHERE status = 'pending' ORDER BY created_at",
            TICKET_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        if tickets.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = tickets.iter().map(|t| t.id).collect();
        let mut legs_by_ticket: HashMap<Uuid, Vec<TicketLegRow>> = HashMap::new();
        for leg in self.legs_for(&ids).await? {
            legs_by_ticket.entry(leg.ticket_id).or_default().push(leg);
        }

        let mut assembled = Vec::with_capacity(tickets.len());
        for ticket in tickets {
            let ticket_id = ticket.id;
            let decoded = legs_by_ticket
                .remove(&ticket_id)
                .unwrap_or_default()
                .into_iter()
                .map(TicketLeg::try_from)
                .collect::<Result<Vec<_>, _>>()
                .and_then(|legs| ComboTicket::from_parts(ticket, legs));

            match decoded {
                Ok(ticket) if ticket.legs.is_empty() => {
                    error!("Skipping ticket {} with no legs", ticket_id);
                }
                Ok(ticket) => assembled.push(ticket),
                Err(e) => error!("Skipping undecodable ticket {}: {}", ticket_id, e),
            }
        }

        Ok(assembled)
    }

    /// Every pending leg, including legs of tickets already decided by a
    /// losing leg
    pub async fn find_pending_legs(&self) -> Result<Vec<TicketLeg>, RepositoryError> {
        let rows = sqlx::query_as::<_, TicketLegRow>(&format!(
            "SELECT {} FROM ticket_legs WHERE status = 'pending' ORDER BY ticket_id, position",
            LEG_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let id = row.id;
                TicketLeg::try_from(row)
                    .map_err(|e| error!("Skipping undecodable leg {}: {}", id, e))
                    .ok()
            })
            .collect())
    }

    /// Record a leg's own result. Returns `false` if it was already resolved.
    pub async fn mark_leg_settled(&self, leg_id: Uuid, status: BetStatus) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE ticket_legs
            SET status = $2, settled_at = NOW()
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(leg_id)
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Move a ticket out of `pending` inside the caller's transaction.
    /// Returns the number of rows changed.
    pub async fn mark_settled(
        conn: &mut PgConnection,
        id: Uuid,
        status: BetStatus,
        multiplier: Decimal,
        payout: Decimal,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE combo_tickets
            SET status = $2, multiplier = $3, payout = $4, settled_at = NOW()
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(multiplier)
        .bind(payout)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected())
    }

    async fn legs_for(&self, ticket_ids: &[Uuid]) -> Result<Vec<TicketLegRow>, RepositoryError> {
        let rows = sqlx::query_as::<_, TicketLegRow>(&format!(
            "SELECT {} FROM ticket_legs WHERE ticket_id = ANY($1) ORDER BY ticket_id, position",
            LEG_COLUMNS
        ))
        .bind(ticket_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
