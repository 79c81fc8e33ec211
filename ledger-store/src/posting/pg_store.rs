use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ledger_core::{Error, Journal, JournalStatus, Result, TransactionLine};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::journals::SqlxJournalStore;

use super::txn::{PostingStore, PostingTransaction};

/// Postgres-backed `PostingStore`.
pub struct PgPostingStore {
    pool: PgPool,
}

impl PgPostingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PostingStore for PgPostingStore {
    async fn begin(&self) -> Result<Box<dyn PostingTransaction + '_>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| {
                error!(error = %e, "failed to begin posting transaction");
                Error::Internal(format!("failed to begin transaction: {e}"))
            })?;
        Ok(Box::new(PgPostingTransaction { tx: Some(tx) }))
    }
}

struct PgPostingTransaction<'a> {
    tx: Option<Transaction<'a, Postgres>>,
}

impl<'a> PgPostingTransaction<'a> {
    fn tx_mut(&mut self) -> &mut Transaction<'a, Postgres> {
        self.tx.as_mut().expect("transaction used after commit")
    }
}

#[async_trait]
impl<'a> PostingTransaction for PgPostingTransaction<'a> {
    async fn lock_accounts(
        &mut self,
        workplace_id: Uuid,
        account_ids_sorted: &[Uuid],
    ) -> Result<HashMap<Uuid, Decimal>> {
        debug!(count = account_ids_sorted.len(), "locking accounts for update");

        let rows = sqlx::query(
            "SELECT id, balance FROM accounts \
             WHERE workplace_id = $1 AND id = ANY($2) \
             ORDER BY id ASC FOR UPDATE",
        )
        .bind(workplace_id)
        .bind(account_ids_sorted)
        .fetch_all(self.tx_mut())
        .await
        .map_err(|e| {
            error!(error = %e, "failed to lock accounts");
            Error::Internal(format!("failed to lock accounts: {e}"))
        })?;

        let mut balances = HashMap::with_capacity(rows.len());
        for row in &rows {
            let id: Uuid = row.try_get("id").map_err(|e| Error::Internal(e.to_string()))?;
            let balance: Decimal = row.try_get("balance").map_err(|e| Error::Internal(e.to_string()))?;
            balances.insert(id, balance);
        }

        for id in account_ids_sorted {
            if !balances.contains_key(id) {
                return Err(Error::NotFound(format!("account {id} not found")));
            }
        }

        Ok(balances)
    }

    async fn apply_deltas(
        &mut self,
        workplace_id: Uuid,
        deltas: &HashMap<Uuid, Decimal>,
        actor: &str,
        at: DateTime<Utc>,
    ) -> Result<()> {
        for (id, delta) in deltas {
            if delta.is_zero() {
                continue;
            }
            let result = sqlx::query(
                "UPDATE accounts SET balance = balance + $1, updated_at = $2 \
                 WHERE id = $3 AND workplace_id = $4 AND active = true",
            )
            .bind(delta)
            .bind(at)
            .bind(id)
            .bind(workplace_id)
            .execute(self.tx_mut())
            .await
            .map_err(|e| {
                error!(error = %e, account_id = %id, "failed to apply delta");
                Error::Internal(format!("failed to apply delta: {e}"))
            })?;

            if result.rows_affected() == 0 {
                warn!(account_id = %id, actor, "apply_deltas affected no rows");
                return Err(Error::NotFound(format!(
                    "account {id} not found or inactive"
                )));
            }
        }
        Ok(())
    }

    async fn save_journal(&mut self, journal: &Journal, lines: &[TransactionLine]) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO journals (
                id, workplace_id, journal_date, description, base_currency_code, status,
                original_journal_id, reversing_journal_id, amount, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(journal.id)
        .bind(journal.workplace_id)
        .bind(journal.journal_date)
        .bind(&journal.description)
        .bind(&journal.base_currency_code)
        .bind(journal.status.to_string())
        .bind(journal.original_journal_id)
        .bind(journal.reversing_journal_id)
        .bind(journal.amount)
        .bind(journal.created_at)
        .bind(journal.updated_at)
        .execute(self.tx_mut())
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                Error::Conflict(format!("journal {} already exists", journal.id))
            }
            other => Error::Internal(format!("failed to insert journal: {other}")),
        })?;

        if lines.is_empty() {
            return Ok(());
        }

        // Single multi-row INSERT for the whole batch rather than one
        // round-trip per line.
        let mut query = String::from(
            "INSERT INTO transactions (\
                id, journal_id, account_id, amount, transaction_type, currency_code, notes, \
                original_amount, original_currency_code, exchange_rate_id, running_balance, \
                transaction_date, created_at, updated_at\
            ) VALUES ",
        );
        for i in 0..lines.len() {
            if i > 0 {
                query.push(',');
            }
            let base = i * 14;
            query.push_str(&format!(
                "(${},${},${},${},${},${},${},${},${},${},${},${},${},${})",
                base + 1,
                base + 2,
                base + 3,
                base + 4,
                base + 5,
                base + 6,
                base + 7,
                base + 8,
                base + 9,
                base + 10,
                base + 11,
                base + 12,
                base + 13,
                base + 14,
            ));
        }

        let mut q = sqlx::query(&query);
        for line in lines {
            q = q
                .bind(line.id)
                .bind(line.journal_id)
                .bind(line.account_id)
                .bind(line.amount)
                .bind(line.transaction_type.to_string())
                .bind(&line.currency_code)
                .bind(&line.notes)
                .bind(line.original_amount)
                .bind(&line.original_currency_code)
                .bind(line.exchange_rate_id)
                .bind(line.running_balance)
                .bind(line.transaction_date)
                .bind(line.created_at)
                .bind(line.updated_at);
        }

        q.execute(self.tx_mut())
            .await
            .map_err(|e| {
                error!(error = %e, journal_id = %journal.id, "failed to insert transaction lines");
                Error::Internal(format!("failed to insert transaction lines: {e}"))
            })?;

        Ok(())
    }

    async fn update_status_and_links(
        &mut self,
        journal_id: Uuid,
        status: JournalStatus,
        reversing_journal_id: Option<Uuid>,
        original_journal_id: Option<Uuid>,
        _actor: &str,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE journals
            SET status = $2,
                reversing_journal_id = COALESCE($3, reversing_journal_id),
                original_journal_id = COALESCE($4, original_journal_id),
                updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(journal_id)
        .bind(status.to_string())
        .bind(reversing_journal_id)
        .bind(original_journal_id)
        .bind(at)
        .execute(self.tx_mut())
        .await
        .map_err(|e| {
            error!(error = %e, %journal_id, "failed to update journal status/links");
            Error::Internal(format!("failed to update journal status/links: {e}"))
        })?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("journal {journal_id} not found")));
        }
        Ok(())
    }

    async fn find_journal_for_update(&mut self, workplace_id: Uuid, journal_id: Uuid) -> Result<Journal> {
        let row = sqlx::query("SELECT * FROM journals WHERE id = $1 AND workplace_id = $2 FOR UPDATE")
            .bind(journal_id)
            .bind(workplace_id)
            .fetch_optional(self.tx_mut())
            .await
            .map_err(|e| {
                error!(error = %e, %journal_id, "failed to fetch journal for update");
                Error::Internal(format!("failed to fetch journal: {e}"))
            })?;

        match row {
            Some(row) => SqlxJournalStore::row_to_journal(&row),
            None => Err(Error::NotFound(format!("journal {journal_id} not found"))),
        }
    }

    async fn find_lines_for_update(&mut self, journal_id: Uuid) -> Result<Vec<TransactionLine>> {
        let rows = sqlx::query("SELECT * FROM transactions WHERE journal_id = $1 ORDER BY created_at ASC")
            .bind(journal_id)
            .fetch_all(self.tx_mut())
            .await
            .map_err(|e| {
                error!(error = %e, %journal_id, "failed to fetch transaction lines for update");
                Error::Internal(format!("failed to fetch transaction lines: {e}"))
            })?;

        rows.iter().map(SqlxJournalStore::row_to_line).collect()
    }

    async fn commit(mut self: Box<Self>) -> Result<()> {
        let tx = self
            .tx
            .take()
            .expect("transaction used after commit");
        tx.commit().await.map_err(|e| {
            error!(error = %e, "failed to commit posting transaction");
            Error::Internal(format!("failed to commit transaction: {e}"))
        })
    }
}
