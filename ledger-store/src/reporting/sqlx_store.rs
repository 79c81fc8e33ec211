use std::str::FromStr;

use async_trait::async_trait;
use chrono::NaiveDate;
use ledger_core::{AccountType, Error, Result};
use rust_decimal::Decimal;
use sqlx::{PgPool, Row};
use tracing::error;
use uuid::Uuid;

use super::{
    ledger_epoch, signed_net, BalanceSheet, BalanceSheetLine, ProfitAndLoss, ProfitAndLossLine,
    ReportingAggregator, TrialBalance, TrialBalanceRow,
};

/// One aggregate query per report (`GROUP BY account_id` with `FILTER`
/// clauses splitting debit/credit totals) rather than the teacher's
/// in-memory per-account loop (`generate_balance_sheet` in
/// `ledger_impl.rs`) — the transaction log is scanned by Postgres, not
/// pulled row-by-row into process memory.
pub struct SqlxReportingAggregator {
    pool: PgPool,
}

impl SqlxReportingAggregator {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Shared query core: per-account (total_debit, total_credit) over
    /// eligible transactions (§4.5: journal not Reversed, not itself a
    /// reversal) dated in `[on_or_after, on_or_before]`, restricted to
    /// `account_types` when non-empty.
    async fn debit_credit_totals(
        &self,
        workplace_id: Uuid,
        on_or_after: Option<NaiveDate>,
        on_or_before: NaiveDate,
        account_types: &[AccountType],
    ) -> Result<Vec<(Uuid, String, AccountType, Decimal, Decimal)>> {
        let type_filter: Vec<String> = account_types.iter().map(|t| t.to_string()).collect();

        let rows = sqlx::query(
            r#"
            SELECT
                a.id AS account_id,
                a.name AS account_name,
                a.account_type AS account_type,
                COALESCE(SUM(t.amount) FILTER (WHERE t.transaction_type = 'debit'), 0) AS total_debit,
                COALESCE(SUM(t.amount) FILTER (WHERE t.transaction_type = 'credit'), 0) AS total_credit
            FROM accounts a
            JOIN transactions t ON t.account_id = a.id
            JOIN journals j ON j.id = t.journal_id
            WHERE a.workplace_id = $1
              AND j.workplace_id = $1
              AND j.status != 'reversed'
              AND j.original_journal_id IS NULL
              AND j.journal_date <= $2
              AND ($3::date IS NULL OR j.journal_date >= $3)
              AND (cardinality($4::text[]) = 0 OR a.account_type = ANY($4))
            GROUP BY a.id, a.name, a.account_type
            "#,
        )
        .bind(workplace_id)
        .bind(on_or_before)
        .bind(on_or_after)
        .bind(&type_filter)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!(error = %e, %workplace_id, "failed to aggregate report totals");
            Error::Internal(format!("failed to aggregate report totals: {e}"))
        })?;

        rows.iter()
            .map(|row| {
                let account_type_str: String =
                    row.try_get("account_type").map_err(|e| Error::Internal(e.to_string()))?;
                Ok((
                    row.try_get("account_id").map_err(|e| Error::Internal(e.to_string()))?,
                    row.try_get("account_name").map_err(|e| Error::Internal(e.to_string()))?,
                    AccountType::from_str(&account_type_str)?,
                    row.try_get("total_debit").map_err(|e| Error::Internal(e.to_string()))?,
                    row.try_get("total_credit").map_err(|e| Error::Internal(e.to_string()))?,
                ))
            })
            .collect()
    }
}

#[async_trait]
impl ReportingAggregator for SqlxReportingAggregator {
    async fn trial_balance(&self, workplace_id: Uuid, as_of: NaiveDate) -> Result<TrialBalance> {
        let totals = self.debit_credit_totals(workplace_id, None, as_of, &[]).await?;

        let rows: Vec<TrialBalanceRow> = totals
            .into_iter()
            .map(|(account_id, account_name, account_type, total_debit, total_credit)| TrialBalanceRow {
                account_id,
                account_name,
                account_type,
                total_debit,
                total_credit,
            })
            .collect();

        let total_debit = rows.iter().map(|r| r.total_debit).sum();
        let total_credit = rows.iter().map(|r| r.total_credit).sum();

        Ok(TrialBalance {
            as_of,
            rows,
            total_debit,
            total_credit,
        })
    }

    async fn profit_and_loss(&self, workplace_id: Uuid, from: NaiveDate, to: NaiveDate) -> Result<ProfitAndLoss> {
        let totals = self
            .debit_credit_totals(
                workplace_id,
                Some(from),
                to,
                &[AccountType::Revenue, AccountType::Expense],
            )
            .await?;

        let mut revenue = Vec::new();
        let mut expense = Vec::new();
        for (account_id, account_name, account_type, debit, credit) in totals {
            let line = ProfitAndLossLine {
                account_id,
                account_name,
                net: signed_net(account_type, debit, credit),
            };
            match account_type {
                AccountType::Revenue => revenue.push(line),
                AccountType::Expense => expense.push(line),
                _ => {}
            }
        }

        let total_revenue: Decimal = revenue.iter().map(|r| r.net).sum();
        let total_expense: Decimal = expense.iter().map(|r| r.net).sum();

        Ok(ProfitAndLoss {
            from,
            to,
            revenue,
            expense,
            total_revenue,
            total_expense,
            net_profit: total_revenue - total_expense,
        })
    }

    async fn balance_sheet(&self, workplace_id: Uuid, as_of: NaiveDate) -> Result<BalanceSheet> {
        let totals = self
            .debit_credit_totals(
                workplace_id,
                None,
                as_of,
                &[AccountType::Asset, AccountType::Liability, AccountType::Equity],
            )
            .await?;

        let mut assets = Vec::new();
        let mut liabilities = Vec::new();
        let mut equity = Vec::new();
        for (account_id, account_name, account_type, debit, credit) in totals {
            let line = BalanceSheetLine {
                account_id,
                account_name,
                net: signed_net(account_type, debit, credit),
            };
            match account_type {
                AccountType::Asset => assets.push(line),
                AccountType::Liability => liabilities.push(line),
                AccountType::Equity => equity.push(line),
                _ => {}
            }
        }

        let total_assets: Decimal = assets.iter().map(|r| r.net).sum();
        let total_liabilities: Decimal = liabilities.iter().map(|r| r.net).sum();
        let total_equity: Decimal = equity.iter().map(|r| r.net).sum();

        let pl = self
            .profit_and_loss(workplace_id, ledger_epoch(), as_of)
            .await?;

        Ok(BalanceSheet {
            as_of,
            assets,
            liabilities,
            equity,
            total_assets,
            total_liabilities,
            total_equity,
            retained_earnings: pl.net_profit,
        })
    }
}
