use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use ledger_core::{Currency, Error, ExchangeRate, Result};
use sqlx::{PgPool, Row};
use tracing::error;

use super::{CurrencyFinder, ExchangeRateFinder};

pub struct SqlxReferenceStore {
    pool: PgPool,
}

impl SqlxReferenceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CurrencyFinder for SqlxReferenceStore {
    async fn get_currency(&self, code: &str) -> Result<Currency> {
        let row = sqlx::query("SELECT * FROM currencies WHERE code = $1")
            .bind(code)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!(error = %e, code, "failed to fetch currency");
                Error::Internal(format!("failed to fetch currency: {e}"))
            })?;

        let row = row.ok_or_else(|| Error::NotFound(format!("currency {code} not found")))?;
        Ok(Currency {
            code: row.try_get("code").map_err(|e| Error::Internal(e.to_string()))?,
            symbol: row.try_get("symbol").map_err(|e| Error::Internal(e.to_string()))?,
            name: row.try_get("name").map_err(|e| Error::Internal(e.to_string()))?,
            precision: row
                .try_get::<i32, _>("precision")
                .map_err(|e| Error::Internal(e.to_string()))? as u32,
        })
    }

    async fn list_currencies(&self) -> Result<Vec<Currency>> {
        let rows = sqlx::query("SELECT * FROM currencies ORDER BY code ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                error!(error = %e, "failed to list currencies");
                Error::Internal(format!("failed to list currencies: {e}"))
            })?;

        rows.iter()
            .map(|row| {
                Ok(Currency {
                    code: row.try_get("code").map_err(|e| Error::Internal(e.to_string()))?,
                    symbol: row.try_get("symbol").map_err(|e| Error::Internal(e.to_string()))?,
                    name: row.try_get("name").map_err(|e| Error::Internal(e.to_string()))?,
                    precision: row
                        .try_get::<i32, _>("precision")
                        .map_err(|e| Error::Internal(e.to_string()))? as u32,
                })
            })
            .collect()
    }
}

#[async_trait]
impl ExchangeRateFinder for SqlxReferenceStore {
    async fn get_exchange_rate(
        &self,
        from_code: &str,
        to_code: &str,
        as_of_date: Option<NaiveDate>,
    ) -> Result<ExchangeRate> {
        let as_of = as_of_date.unwrap_or_else(|| Utc::now().date_naive());

        let row = sqlx::query(
            "SELECT * FROM exchange_rates \
             WHERE from_code = $1 AND to_code = $2 AND effective_date <= $3 \
             ORDER BY effective_date DESC LIMIT 1",
        )
        .bind(from_code)
        .bind(to_code)
        .bind(as_of)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!(error = %e, from_code, to_code, "failed to fetch exchange rate");
            Error::Internal(format!("failed to fetch exchange rate: {e}"))
        })?;

        let row = row.ok_or_else(|| {
            Error::NotFound(format!("no exchange rate {from_code}->{to_code} as of {as_of}"))
        })?;

        Ok(ExchangeRate {
            id: row.try_get("id").map_err(|e| Error::Internal(e.to_string()))?,
            from_code: row.try_get("from_code").map_err(|e| Error::Internal(e.to_string()))?,
            to_code: row.try_get("to_code").map_err(|e| Error::Internal(e.to_string()))?,
            effective_date: row
                .try_get("effective_date")
                .map_err(|e| Error::Internal(e.to_string()))?,
            rate: row.try_get("rate").map_err(|e| Error::Internal(e.to_string()))?,
            created_at: row.try_get("created_at").map_err(|e| Error::Internal(e.to_string()))?,
            updated_at: row.try_get("updated_at").map_err(|e| Error::Internal(e.to_string()))?,
        })
    }

    async fn save_exchange_rate(&self, rate: &ExchangeRate) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO exchange_rates (id, from_code, to_code, effective_date, rate, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(rate.id)
        .bind(&rate.from_code)
        .bind(&rate.to_code)
        .bind(rate.effective_date)
        .bind(rate.rate)
        .bind(rate.created_at)
        .bind(rate.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => Error::Conflict(format!(
                "exchange rate {}->{} on {} already exists",
                rate.from_code, rate.to_code, rate.effective_date
            )),
            other => {
                error!(error = %other, from_code = %rate.from_code, to_code = %rate.to_code, "failed to save exchange rate");
                Error::Internal(format!("failed to save exchange rate: {other}"))
            }
        })?;
        Ok(())
    }
}
