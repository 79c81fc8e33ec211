use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ledger_core::{Account, AccountType, Error, Result};
use sqlx::{PgPool, Row};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::reference::CurrencyFinder;

use super::AccountStore;

const DEFAULT_LIST_LIMIT: i64 = 20;
const MAX_LIST_LIMIT: i64 = 100;

/// Postgres-backed implementation of `AccountStore`.
pub struct SqlxAccountStore {
    pool: PgPool,
    currencies: Arc<dyn CurrencyFinder>,
}

impl SqlxAccountStore {
    pub fn new(pool: PgPool, currencies: Arc<dyn CurrencyFinder>) -> Self {
        Self { pool, currencies }
    }

    /// §4.1 Save/Update's "currency/workplace unknown" validation. The
    /// schema's foreign keys would surface an unknown currency as an
    /// opaque constraint violation; this check turns it into the
    /// Validation error §7 calls for instead.
    async fn validate_references(&self, account: &Account) -> Result<()> {
        if account.name.trim().is_empty() {
            return Err(Error::Validation("account name is required".to_string()));
        }
        self.currencies.get_currency(&account.currency_code).await.map_err(|_| {
            Error::Validation(format!("unknown currency code {}", account.currency_code))
        })?;
        if let Some(parent_id) = account.parent_account_id {
            // `find_by_id` already filters on workplace_id, so a hit here
            // proves the parent exists in the same workplace.
            self.find_by_id(account.workplace_id, parent_id).await.map_err(|_| {
                Error::Validation(format!(
                    "parent account {parent_id} not found in workplace {}",
                    account.workplace_id
                ))
            })?;
        }
        Ok(())
    }

    fn row_to_account(row: &sqlx::postgres::PgRow) -> Result<Account> {
        let account_type_str: String = row
            .try_get("account_type")
            .map_err(|e| Error::Internal(format!("failed to read account_type: {e}")))?;
        let account_type = AccountType::from_str(&account_type_str)?;

        Ok(Account {
            id: row
                .try_get("id")
                .map_err(|e| Error::Internal(format!("failed to read id: {e}")))?,
            workplace_id: row
                .try_get("workplace_id")
                .map_err(|e| Error::Internal(format!("failed to read workplace_id: {e}")))?,
            user_facing_id: row
                .try_get("user_facing_id")
                .map_err(|e| Error::Internal(format!("failed to read user_facing_id: {e}")))?,
            name: row
                .try_get("name")
                .map_err(|e| Error::Internal(format!("failed to read name: {e}")))?,
            account_type,
            currency_code: row
                .try_get("currency_code")
                .map_err(|e| Error::Internal(format!("failed to read currency_code: {e}")))?,
            parent_account_id: row
                .try_get("parent_account_id")
                .map_err(|e| Error::Internal(format!("failed to read parent_account_id: {e}")))?,
            description: row
                .try_get("description")
                .map_err(|e| Error::Internal(format!("failed to read description: {e}")))?,
            active: row
                .try_get("active")
                .map_err(|e| Error::Internal(format!("failed to read active: {e}")))?,
            balance: row
                .try_get("balance")
                .map_err(|e| Error::Internal(format!("failed to read balance: {e}")))?,
            created_at: row
                .try_get("created_at")
                .map_err(|e| Error::Internal(format!("failed to read created_at: {e}")))?,
            updated_at: row
                .try_get("updated_at")
                .map_err(|e| Error::Internal(format!("failed to read updated_at: {e}")))?,
        })
    }
}

#[async_trait]
impl AccountStore for SqlxAccountStore {
    async fn save(&self, account: &Account) -> Result<()> {
        info!(account_id = %account.id, "creating account");
        self.validate_references(account).await?;

        let query = r#"
            INSERT INTO accounts (
                id, workplace_id, user_facing_id, name, account_type, currency_code,
                parent_account_id, description, active, balance, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        "#;

        sqlx::query(query)
            .bind(account.id)
            .bind(account.workplace_id)
            .bind(&account.user_facing_id)
            .bind(&account.name)
            .bind(account.account_type.to_string())
            .bind(&account.currency_code)
            .bind(account.parent_account_id)
            .bind(&account.description)
            .bind(account.active)
            .bind(account.balance)
            .bind(account.created_at)
            .bind(account.updated_at)
            .execute(&self.pool)
            .await
            .map_err(|e| match &e {
                sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                    Error::Conflict(format!("account {} already exists", account.id))
                }
                other => {
                    error!(error = %other, account_id = %account.id, "failed to insert account");
                    Error::Internal(format!("failed to insert account: {other}"))
                }
            })?;

        Ok(())
    }

    async fn find_by_id(&self, workplace_id: Uuid, id: Uuid) -> Result<Account> {
        let row = sqlx::query(
            "SELECT * FROM accounts WHERE id = $1 AND workplace_id = $2",
        )
        .bind(id)
        .bind(workplace_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!(error = %e, %id, "failed to fetch account");
            Error::Internal(format!("failed to fetch account: {e}"))
        })?;

        match row {
            Some(row) => Self::row_to_account(&row),
            None => Err(Error::NotFound(format!("account {id} not found"))),
        }
    }

    async fn find_by_user_facing_id(
        &self,
        workplace_id: Uuid,
        user_facing_id: &str,
    ) -> Result<Account> {
        let row = sqlx::query(
            "SELECT * FROM accounts WHERE user_facing_id = $1 AND workplace_id = $2",
        )
        .bind(user_facing_id)
        .bind(workplace_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!(error = %e, user_facing_id, "failed to fetch account by user_facing_id");
            Error::Internal(format!("failed to fetch account: {e}"))
        })?;

        match row {
            Some(row) => Self::row_to_account(&row),
            None => Err(Error::NotFound(format!(
                "account with user_facing_id {user_facing_id} not found"
            ))),
        }
    }

    async fn find_many_by_id(
        &self,
        workplace_id: Uuid,
        ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Account>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query("SELECT * FROM accounts WHERE workplace_id = $1 AND id = ANY($2)")
            .bind(workplace_id)
            .bind(ids)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                error!(error = %e, %workplace_id, "failed to fetch accounts");
                Error::Internal(format!("failed to fetch accounts: {e}"))
            })?;

        let mut out = HashMap::with_capacity(rows.len());
        for row in &rows {
            let account = Self::row_to_account(row)?;
            out.insert(account.id, account);
        }
        Ok(out)
    }

    async fn list(&self, workplace_id: Uuid, limit: i64, offset: i64) -> Result<Vec<Account>> {
        let limit = if limit <= 0 { DEFAULT_LIST_LIMIT } else { limit.min(MAX_LIST_LIMIT) };

        let rows = sqlx::query(
            "SELECT * FROM accounts WHERE workplace_id = $1 ORDER BY name ASC LIMIT $2 OFFSET $3",
        )
        .bind(workplace_id)
        .bind(limit)
        .bind(offset.max(0))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!(error = %e, %workplace_id, "failed to list accounts");
            Error::Internal(format!("failed to list accounts: {e}"))
        })?;

        rows.iter().map(Self::row_to_account).collect()
    }

    async fn update(&self, account: &Account) -> Result<Account> {
        debug!(account_id = %account.id, "updating account");

        if let Some(parent_id) = account.parent_account_id {
            self.find_by_id(account.workplace_id, parent_id).await.map_err(|_| {
                Error::Validation(format!(
                    "parent account {parent_id} not found in workplace {}",
                    account.workplace_id
                ))
            })?;
        }

        let existing = self.find_by_id(account.workplace_id, account.id).await?;
        if existing.account_type != account.account_type
            || existing.currency_code != account.currency_code
        {
            return Err(Error::Validation(
                "account type and currency are immutable".to_string(),
            ));
        }

        let row = sqlx::query(
            r#"
            UPDATE accounts
            SET name = $3, description = $4, parent_account_id = $5, active = $6, updated_at = $7
            WHERE id = $1 AND workplace_id = $2
            RETURNING *
            "#,
        )
        .bind(account.id)
        .bind(account.workplace_id)
        .bind(&account.name)
        .bind(&account.description)
        .bind(account.parent_account_id)
        .bind(account.active)
        .bind(account.updated_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!(error = %e, account_id = %account.id, "failed to update account");
            Error::Internal(format!("failed to update account: {e}"))
        })?;

        match row {
            Some(row) => Self::row_to_account(&row),
            None => Err(Error::NotFound(format!("account {} not found", account.id))),
        }
    }

    async fn deactivate(
        &self,
        workplace_id: Uuid,
        id: Uuid,
        actor: &str,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE accounts SET active = false, updated_at = $3 WHERE id = $1 AND workplace_id = $2 AND active = true",
        )
        .bind(id)
        .bind(workplace_id)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!(error = %e, %id, "failed to deactivate account");
            Error::Internal(format!("failed to deactivate account: {e}"))
        })?;

        if result.rows_affected() == 0 {
            // Idempotent: it's only an error if the account doesn't exist at all.
            self.find_by_id(workplace_id, id).await?;
            warn!(account_id = %id, actor, "deactivate called on already-inactive account");
        }

        Ok(())
    }
}
