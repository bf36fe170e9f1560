use crate::error::RepositoryError;
use crate::models::{BetStatus, Wager, WagerRow};
use crate::odds::MarketTerms;
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use tracing::error;
use uuid::Uuid;

const WAGER_COLUMNS: &str = "id, account_id, match_id, pick, favorite, handicap_line, price, \
                             stake, status, payout, settled_at, created_at";

/// Repository for single-leg wagers
pub struct WagerRepository {
    pool: PgPool,
}

impl WagerRepository {
    /// Create a new WagerRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a pending wager. Placement debits the stake elsewhere; this
    /// only records the terms.
    pub async fn create(
        &self,
        account_id: Uuid,
        match_id: &str,
        terms: &MarketTerms,
        stake: Decimal,
    ) -> Result<Wager, RepositoryError> {
        let row = sqlx::query_as::<_, WagerRow>(&format!(
            r#"
            INSERT INTO wagers (account_id, match_id, pick, favorite, handicap_line, price, stake)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            WAGER_COLUMNS
        ))
        .bind(account_id)
        .bind(match_id)
        .bind(terms.pick.as_str())
        .bind(terms.favorite.as_str())
        .bind(terms.line)
        .bind(terms.price)
        .bind(stake)
        .fetch_one(&self.pool)
        .await?;

        Wager::try_from(row).map_err(RepositoryError::InvalidInput)
    }

    /// Find a wager by UUID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Wager>, RepositoryError> {
        let row = sqlx::query_as::<_, WagerRow>(&format!(
            "SELECT {} FROM wagers WHERE id = $1",
            WAGER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Wager::try_from)
            .transpose()
            .map_err(RepositoryError::InvalidInput)
    }

    /// All pending wagers, oldest first. Rows that do not decode are logged
    /// and left for inspection rather than failing the whole batch.
    pub async fn find_pending(&self) -> Result<Vec<Wager>, RepositoryError> {
        let rows = sqlx::query_as::<_, WagerRow>(&format!(
            "SELECT {} FROM wagers WHERE status = 'pending' ORDER BY created_at",
            WAGER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let id = row.id;
                Wager::try_from(row)
                    .map_err(|e| error!("Skipping undecodable wager {}: {}", id, e))
                    .ok()
            })
            .collect())
    }

    /// Move a wager out of `pending` inside the caller's transaction.
    ///
    /// Returns the number of rows changed: `0` means another run already
    /// settled it.
    pub async fn mark_settled(
        conn: &mut PgConnection,
        id: Uuid,
        status: BetStatus,
        payout: Decimal,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE wagers
            SET status = $2, payout = $3, settled_at = NOW()
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(payout)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected())
    }
}
