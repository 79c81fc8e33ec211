use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use ledger_core::cursor::{paginate, Cursor, Page};
use ledger_core::{Error, Journal, JournalStatus, Result, TransactionLine, TransactionType};
use sqlx::{PgPool, Row};
use tracing::{debug, error};
use uuid::Uuid;

use super::JournalStore;

const DEFAULT_LIST_LIMIT: i64 = 20;
const MAX_LIST_LIMIT: i64 = 100;

/// Postgres-backed implementation of `JournalStore`.
pub struct SqlxJournalStore {
    pool: PgPool,
}

impl SqlxJournalStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub(crate) fn row_to_journal(row: &sqlx::postgres::PgRow) -> Result<Journal> {
        let status_str: String = row
            .try_get("status")
            .map_err(|e| Error::Internal(format!("failed to read status: {e}")))?;
        Ok(Journal {
            id: row.try_get("id").map_err(|e| Error::Internal(e.to_string()))?,
            workplace_id: row
                .try_get("workplace_id")
                .map_err(|e| Error::Internal(e.to_string()))?,
            journal_date: row
                .try_get("journal_date")
                .map_err(|e| Error::Internal(e.to_string()))?,
            description: row
                .try_get("description")
                .map_err(|e| Error::Internal(e.to_string()))?,
            base_currency_code: row
                .try_get("base_currency_code")
                .map_err(|e| Error::Internal(e.to_string()))?,
            status: JournalStatus::from_str(&status_str)?,
            original_journal_id: row
                .try_get("original_journal_id")
                .map_err(|e| Error::Internal(e.to_string()))?,
            reversing_journal_id: row
                .try_get("reversing_journal_id")
                .map_err(|e| Error::Internal(e.to_string()))?,
            amount: row.try_get("amount").map_err(|e| Error::Internal(e.to_string()))?,
            created_at: row
                .try_get("created_at")
                .map_err(|e| Error::Internal(e.to_string()))?,
            updated_at: row
                .try_get("updated_at")
                .map_err(|e| Error::Internal(e.to_string()))?,
        })
    }

    pub(crate) fn row_to_line(row: &sqlx::postgres::PgRow) -> Result<TransactionLine> {
        let transaction_type_str: String = row
            .try_get("transaction_type")
            .map_err(|e| Error::Internal(format!("failed to read transaction_type: {e}")))?;
        Ok(TransactionLine {
            id: row.try_get("id").map_err(|e| Error::Internal(e.to_string()))?,
            journal_id: row
                .try_get("journal_id")
                .map_err(|e| Error::Internal(e.to_string()))?,
            account_id: row
                .try_get("account_id")
                .map_err(|e| Error::Internal(e.to_string()))?,
            amount: row.try_get("amount").map_err(|e| Error::Internal(e.to_string()))?,
            transaction_type: TransactionType::from_str(&transaction_type_str)?,
            currency_code: row
                .try_get("currency_code")
                .map_err(|e| Error::Internal(e.to_string()))?,
            notes: row.try_get("notes").map_err(|e| Error::Internal(e.to_string()))?,
            original_amount: row
                .try_get("original_amount")
                .map_err(|e| Error::Internal(e.to_string()))?,
            original_currency_code: row
                .try_get("original_currency_code")
                .map_err(|e| Error::Internal(e.to_string()))?,
            exchange_rate_id: row
                .try_get("exchange_rate_id")
                .map_err(|e| Error::Internal(e.to_string()))?,
            running_balance: row
                .try_get("running_balance")
                .map_err(|e| Error::Internal(e.to_string()))?,
            transaction_date: row
                .try_get("transaction_date")
                .map_err(|e| Error::Internal(e.to_string()))?,
            created_at: row
                .try_get("created_at")
                .map_err(|e| Error::Internal(e.to_string()))?,
            updated_at: row
                .try_get("updated_at")
                .map_err(|e| Error::Internal(e.to_string()))?,
        })
    }
}

fn date_at_midnight_utc(date: NaiveDate) -> chrono::DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).expect("midnight is always valid"))
}

#[async_trait]
impl JournalStore for SqlxJournalStore {
    async fn find_journal_by_id(&self, workplace_id: Uuid, id: Uuid) -> Result<Journal> {
        let row = sqlx::query("SELECT * FROM journals WHERE id = $1 AND workplace_id = $2")
            .bind(id)
            .bind(workplace_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!(error = %e, %id, "failed to fetch journal");
                Error::Internal(format!("failed to fetch journal: {e}"))
            })?;

        match row {
            Some(row) => Self::row_to_journal(&row),
            None => Err(Error::NotFound(format!("journal {id} not found"))),
        }
    }

    async fn find_transactions_by_journal_id(&self, journal_id: Uuid) -> Result<Vec<TransactionLine>> {
        let rows = sqlx::query(
            "SELECT * FROM transactions WHERE journal_id = $1 ORDER BY created_at ASC",
        )
        .bind(journal_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!(error = %e, %journal_id, "failed to fetch transaction lines");
            Error::Internal(format!("failed to fetch transaction lines: {e}"))
        })?;

        rows.iter().map(Self::row_to_line).collect()
    }

    async fn find_transactions_by_journal_ids(
        &self,
        journal_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<TransactionLine>>> {
        let mut out: HashMap<Uuid, Vec<TransactionLine>> =
            journal_ids.iter().map(|id| (*id, Vec::new())).collect();
        if journal_ids.is_empty() {
            return Ok(out);
        }

        let rows = sqlx::query(
            "SELECT * FROM transactions WHERE journal_id = ANY($1) ORDER BY created_at ASC",
        )
        .bind(journal_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!(error = %e, "failed to fetch transaction lines by journal ids");
            Error::Internal(format!("failed to fetch transaction lines: {e}"))
        })?;

        for row in &rows {
            let line = Self::row_to_line(row)?;
            out.entry(line.journal_id).or_default().push(line);
        }
        Ok(out)
    }

    async fn list_journals_by_workplace(
        &self,
        workplace_id: Uuid,
        limit: i64,
        cursor: Option<Cursor>,
        include_reversals: bool,
    ) -> Result<Page<Journal>> {
        let limit = if limit <= 0 { DEFAULT_LIST_LIMIT } else { limit.min(MAX_LIST_LIMIT) };

        let mut query = String::from("SELECT * FROM journals WHERE workplace_id = $1");
        if !include_reversals {
            query.push_str(
                " AND status != 'reversed' AND original_journal_id IS NULL AND reversing_journal_id IS NULL",
            );
        }
        if cursor.is_some() {
            query.push_str(" AND (journal_date, created_at) < ($2, $3)");
            query.push_str(" ORDER BY journal_date DESC, created_at DESC LIMIT $4");
        } else {
            query.push_str(" ORDER BY journal_date DESC, created_at DESC LIMIT $2");
        }

        debug!(workplace_id = %workplace_id, include_reversals, "listing journals");

        let mut q = sqlx::query(&query).bind(workplace_id);
        if let Some(c) = cursor {
            q = q.bind(c.date.date_naive()).bind(c.created_at).bind(limit + 1);
        } else {
            q = q.bind(limit + 1);
        }

        let rows = q
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                error!(error = %e, %workplace_id, "failed to list journals");
                Error::Internal(format!("failed to list journals: {e}"))
            })?;

        let journals = rows
            .iter()
            .map(Self::row_to_journal)
            .collect::<Result<Vec<_>>>()?;

        Ok(paginate(journals, limit as usize, |j| {
            (date_at_midnight_utc(j.journal_date), j.created_at)
        }))
    }

    async fn list_transactions_by_account(
        &self,
        workplace_id: Uuid,
        account_id: Uuid,
        limit: i64,
        cursor: Option<Cursor>,
    ) -> Result<Page<TransactionLine>> {
        let limit = if limit <= 0 { DEFAULT_LIST_LIMIT } else { limit.min(MAX_LIST_LIMIT) };

        let mut query = String::from(
            "SELECT t.* FROM transactions t JOIN journals j ON j.id = t.journal_id \
             WHERE t.account_id = $1 AND j.workplace_id = $2",
        );
        if cursor.is_some() {
            query.push_str(" AND (j.journal_date, t.created_at) < ($3, $4)");
            query.push_str(" ORDER BY j.journal_date DESC, t.created_at DESC LIMIT $5");
        } else {
            query.push_str(" ORDER BY j.journal_date DESC, t.created_at DESC LIMIT $3");
        }

        let mut q = sqlx::query(&query).bind(account_id).bind(workplace_id);
        if let Some(c) = cursor {
            q = q.bind(c.date.date_naive()).bind(c.created_at).bind(limit + 1);
        } else {
            q = q.bind(limit + 1);
        }

        let rows = q
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                error!(error = %e, %account_id, "failed to list transactions");
                Error::Internal(format!("failed to list transactions: {e}"))
            })?;

        let lines = rows.iter().map(Self::row_to_line).collect::<Result<Vec<_>>>()?;

        // The journal_date isn't carried on the line itself; refetch the
        // owning journals once to build accurate cursor keys.
        let journal_ids: Vec<Uuid> = lines.iter().map(|l| l.journal_id).collect();
        let journal_dates: HashMap<Uuid, NaiveDate> = if journal_ids.is_empty() {
            HashMap::new()
        } else {
            sqlx::query("SELECT id, journal_date FROM journals WHERE id = ANY($1)")
                .bind(&journal_ids)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| {
                    error!(error = %e, "failed to fetch journal dates");
                    Error::Internal(format!("failed to fetch journal dates: {e}"))
                })?
                .iter()
                .map(|row| -> Result<(Uuid, NaiveDate)> {
                    Ok((
                        row.try_get("id").map_err(|e| Error::Internal(e.to_string()))?,
                        row.try_get("journal_date").map_err(|e| Error::Internal(e.to_string()))?,
                    ))
                })
                .collect::<Result<HashMap<_, _>>>()?
        };

        Ok(paginate(lines, limit as usize, |line| {
            let date = journal_dates
                .get(&line.journal_id)
                .copied()
                .unwrap_or_else(|| line.transaction_date.date_naive());
            (date_at_midnight_utc(date), line.created_at)
        }))
    }

    async fn update_journal(
        &self,
        workplace_id: Uuid,
        journal_id: Uuid,
        date: Option<NaiveDate>,
        description: Option<String>,
    ) -> Result<Journal> {
        let existing = self.find_journal_by_id(workplace_id, journal_id).await?;
        let new_date = date.unwrap_or(existing.journal_date);
        let new_description = description.unwrap_or(existing.description.clone());
        let now = Utc::now();

        let row = sqlx::query(
            r#"
            UPDATE journals
            SET journal_date = $3, description = $4, updated_at = $5
            WHERE id = $1 AND workplace_id = $2
            RETURNING *
            "#,
        )
        .bind(journal_id)
        .bind(workplace_id)
        .bind(new_date)
        .bind(new_description)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!(error = %e, %journal_id, "failed to update journal");
            Error::Internal(format!("failed to update journal: {e}"))
        })?;

        match row {
            Some(row) => Self::row_to_journal(&row),
            None => Err(Error::NotFound(format!("journal {journal_id} not found"))),
        }
    }
}
