//! Repository for the append-only payout ledger

use crate::error::RepositoryError;
use crate::models::{LedgerEntry, LedgerEntryType};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

/// Ledger entry about to be appended
#[derive(Debug, Clone)]
pub struct NewLedgerEntry {
    pub account_id: Uuid,
    pub entry_type: LedgerEntryType,
    /// Wager or ticket id, matching `entry_type`
    pub source_id: Uuid,
    pub amount: Decimal,
    pub balance_after: Decimal,
}

pub struct LedgerRepository {
    pool: PgPool,
}

impl LedgerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Append one entry inside the caller's transaction
    pub async fn append(
        conn: &mut PgConnection,
        entry: &NewLedgerEntry,
    ) -> Result<LedgerEntry, RepositoryError> {
        let (wager_id, ticket_id) = match entry.entry_type {
            LedgerEntryType::WagerPayout => (Some(entry.source_id), None),
            LedgerEntryType::TicketPayout => (None, Some(entry.source_id)),
        };

        let created = sqlx::query_as::<_, LedgerEntry>(
            r#"
            INSERT INTO ledger_entries
            (account_id, wager_id, ticket_id, entry_type, amount, balance_after)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, account_id, wager_id, ticket_id, entry_type, amount, balance_after, created_at
            "#,
        )
        .bind(entry.account_id)
        .bind(wager_id)
        .bind(ticket_id)
        .bind(entry.entry_type.as_str())
        .bind(entry.amount)
        .bind(entry.balance_after)
        .fetch_one(&mut *conn)
        .await?;

        Ok(created)
    }

    /// Get ledger history for an account, newest first
    pub async fn find_by_account(
        &self,
        account_id: Uuid,
        limit: i64,
    ) -> Result<Vec<LedgerEntry>, RepositoryError> {
        let entries = sqlx::query_as::<_, LedgerEntry>(
            r#"
            SELECT id, account_id, wager_id, ticket_id, entry_type, amount, balance_after, created_at
            FROM ledger_entries
            WHERE account_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(account_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Entries recorded for a wager or ticket (at most one by constraint)
    pub async fn find_by_source(&self, source_id: Uuid) -> Result<Vec<LedgerEntry>, RepositoryError> {
        let entries = sqlx::query_as::<_, LedgerEntry>(
            r#"
            SELECT id, account_id, wager_id, ticket_id, entry_type, amount, balance_after, created_at
            FROM ledger_entries
            WHERE wager_id = $1 OR ticket_id = $1
            "#,
        )
        .bind(source_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }
}
