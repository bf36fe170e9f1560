//! Repository for account balances

use crate::error::RepositoryError;
use crate::models::Account;
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

pub struct AccountRepository {
    pool: PgPool,
}

impl AccountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new account with an opening balance
    pub async fn create(&self, username: &str, balance: Decimal) -> Result<Account, RepositoryError> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO accounts (username, balance)
            VALUES ($1, $2)
            RETURNING id, username, balance, created_at, updated_at
            "#,
        )
        .bind(username)
        .bind(balance)
        .fetch_one(&self.pool)
        .await?;

        Ok(account)
    }

    /// Find an account by UUID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, RepositoryError> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, username, balance, created_at, updated_at
            FROM accounts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    /// Credit `amount` inside the caller's transaction and return the new
    /// balance. The increment is evaluated by the database against the
    /// locked row, never from a previously read value.
    pub async fn credit(
        conn: &mut PgConnection,
        account_id: Uuid,
        amount: Decimal,
    ) -> Result<Decimal, RepositoryError> {
        let balance = sqlx::query_scalar::<_, Decimal>(
            r#"
            UPDATE accounts
            SET balance = balance + $2, updated_at = NOW()
            WHERE id = $1
            RETURNING balance
            "#,
        )
        .bind(account_id)
        .bind(amount)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| RepositoryError::NotFound(format!("Account {} not found", account_id)))?;

        Ok(balance)
    }
}
