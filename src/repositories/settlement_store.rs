//! Persistence seam used by the settlement engine.
//!
//! Every `settle_*` call is one isolated unit: the conditional status update,
//! the balance credit and the ledger entry commit together or not at all.

use super::{
    AccountRepository, LedgerRepository, NewLedgerEntry, TicketRepository, WagerRepository,
};
use crate::error::RepositoryError;
use crate::models::{BetStatus, ComboTicket, LedgerEntry, LedgerEntryType, TicketLeg, Wager};
use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

/// Terminal state to write for a single wager
#[derive(Debug, Clone)]
pub struct WagerSettlement {
    pub wager_id: Uuid,
    pub account_id: Uuid,
    pub status: BetStatus,
    pub payout: Decimal,
}

/// Terminal state to write for a combination ticket
#[derive(Debug, Clone)]
pub struct TicketSettlement {
    pub ticket_id: Uuid,
    pub account_id: Uuid,
    pub status: BetStatus,
    pub multiplier: Decimal,
    pub payout: Decimal,
}

/// Result of one settlement unit
#[derive(Debug, Clone)]
pub enum SettleOutcome {
    /// Status written; `credited` holds the ledger entry when a payout was due
    Applied { credited: Option<LedgerEntry> },
    /// The conditional update matched nothing: already terminal
    AlreadySettled,
}

#[async_trait]
pub trait SettlementStore: Send + Sync {
    async fn pending_wagers(&self) -> Result<Vec<Wager>, RepositoryError>;

    async fn settle_wager(&self, settlement: &WagerSettlement) -> Result<SettleOutcome, RepositoryError>;

    /// Pending legs regardless of their ticket's status
    async fn pending_legs(&self) -> Result<Vec<TicketLeg>, RepositoryError>;

    /// Returns `false` when the leg was no longer pending
    async fn settle_leg(&self, leg_id: Uuid, status: BetStatus) -> Result<bool, RepositoryError>;

    async fn pending_tickets(&self) -> Result<Vec<ComboTicket>, RepositoryError>;

    async fn settle_ticket(&self, settlement: &TicketSettlement) -> Result<SettleOutcome, RepositoryError>;
}

/// PostgreSQL-backed store
pub struct PgSettlementStore {
    pool: PgPool,
    wager_repo: Arc<WagerRepository>,
    ticket_repo: Arc<TicketRepository>,
}

impl PgSettlementStore {
    pub fn new(pool: PgPool, wager_repo: Arc<WagerRepository>, ticket_repo: Arc<TicketRepository>) -> Self {
        Self {
            pool,
            wager_repo,
            ticket_repo,
        }
    }

    /// Credit a payout and append its ledger entry inside `conn`'s transaction
    async fn credit_payout(
        conn: &mut sqlx::PgConnection,
        account_id: Uuid,
        entry_type: LedgerEntryType,
        source_id: Uuid,
        amount: Decimal,
    ) -> Result<Option<LedgerEntry>, RepositoryError> {
        if amount <= Decimal::ZERO {
            return Ok(None);
        }

        let balance_after = AccountRepository::credit(&mut *conn, account_id, amount).await?;
        let entry = LedgerRepository::append(
            &mut *conn,
            &NewLedgerEntry {
                account_id,
                entry_type,
                source_id,
                amount,
                balance_after,
            },
        )
        .await?;

        Ok(Some(entry))
    }
}

#[async_trait]
impl SettlementStore for PgSettlementStore {
    async fn pending_wagers(&self) -> Result<Vec<Wager>, RepositoryError> {
        self.wager_repo.find_pending().await
    }

    async fn settle_wager(&self, settlement: &WagerSettlement) -> Result<SettleOutcome, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let updated = WagerRepository::mark_settled(
            &mut *tx,
            settlement.wager_id,
            settlement.status,
            settlement.payout,
        )
        .await?;

        if updated == 0 {
            tx.rollback().await?;
            return Ok(SettleOutcome::AlreadySettled);
        }

        let credited = Self::credit_payout(
            &mut *tx,
            settlement.account_id,
            LedgerEntryType::WagerPayout,
            settlement.wager_id,
            settlement.payout,
        )
        .await?;

        tx.commit().await?;

        Ok(SettleOutcome::Applied { credited })
    }

    async fn pending_legs(&self) -> Result<Vec<TicketLeg>, RepositoryError> {
        self.ticket_repo.find_pending_legs().await
    }

    async fn settle_leg(&self, leg_id: Uuid, status: BetStatus) -> Result<bool, RepositoryError> {
        self.ticket_repo.mark_leg_settled(leg_id, status).await
    }

    async fn pending_tickets(&self) -> Result<Vec<ComboTicket>, RepositoryError> {
        self.ticket_repo.find_pending_with_legs().await
    }

    async fn settle_ticket(&self, settlement: &TicketSettlement) -> Result<SettleOutcome, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let updated = TicketRepository::mark_settled(
            &mut *tx,
            settlement.ticket_id,
            settlement.status,
            settlement.multiplier,
            settlement.payout,
        )
        .await?;

        if updated == 0 {
            tx.rollback().await?;
            return Ok(SettleOutcome::AlreadySettled);
        }

        let credited = Self::credit_payout(
            &mut *tx,
            settlement.account_id,
            LedgerEntryType::TicketPayout,
            settlement.ticket_id,
            settlement.payout,
        )
        .await?;

        tx.commit().await?;

        Ok(SettleOutcome::Applied { credited })
    }
}
