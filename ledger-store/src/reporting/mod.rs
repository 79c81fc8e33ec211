//! Reporting aggregator (C5): trial balance, profit-and-loss and
//! balance-sheet views derived from the immutable transaction log.
//! §4.5 excludes Reversed journals and journals that are themselves a
//! reversal so every report agrees with the materialized balances at
//! steady state.

mod memory;
mod sqlx_store;

pub use memory::InMemoryReportingAggregator;
pub use sqlx_store::SqlxReportingAggregator;

use async_trait::async_trait;
use chrono::NaiveDate;
use ledger_core::{AccountType, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One account's row in a trial balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialBalanceRow {
    pub account_id: Uuid,
    pub account_name: String,
    pub account_type: AccountType,
    pub total_debit: Decimal,
    pub total_credit: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialBalance {
    pub as_of: NaiveDate,
    pub rows: Vec<TrialBalanceRow>,
    pub total_debit: Decimal,
    pub total_credit: Decimal,
}

/// One account's net contribution to a profit-and-loss report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfitAndLossLine {
    pub account_id: Uuid,
    pub account_name: String,
    pub net: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfitAndLoss {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub revenue: Vec<ProfitAndLossLine>,
    pub expense: Vec<ProfitAndLossLine>,
    pub total_revenue: Decimal,
    pub total_expense: Decimal,
    pub net_profit: Decimal,
}

/// One account's net contribution to a balance sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceSheetLine {
    pub account_id: Uuid,
    pub account_name: String,
    pub net: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceSheet {
    pub as_of: NaiveDate,
    pub assets: Vec<BalanceSheetLine>,
    pub liabilities: Vec<BalanceSheetLine>,
    pub equity: Vec<BalanceSheetLine>,
    pub total_assets: Decimal,
    pub total_liabilities: Decimal,
    pub total_equity: Decimal,
    /// Cumulative P&L up to `as_of`, folded into equity so that
    /// `total_assets == total_liabilities + total_equity + retained_earnings`.
    pub retained_earnings: Decimal,
}

#[async_trait]
pub trait ReportingAggregator: Send + Sync {
    /// §4.5 trial balance as of `as_of`: per-account debit/credit sums
    /// over eligible journals dated on or before `as_of`.
    async fn trial_balance(&self, workplace_id: Uuid, as_of: NaiveDate) -> Result<TrialBalance>;

    /// §4.5 profit & loss over eligible journals dated in `[from, to]`.
    async fn profit_and_loss(&self, workplace_id: Uuid, from: NaiveDate, to: NaiveDate) -> Result<ProfitAndLoss>;

    /// §4.5 balance sheet as of `as_of`, with retained earnings derived
    /// from the same as-of-D trial balance rather than a second query.
    async fn balance_sheet(&self, workplace_id: Uuid, as_of: NaiveDate) -> Result<BalanceSheet>;
}

/// Signed net contribution of one account's (debit, credit) totals,
/// per the §4.3 sign rule: Asset/Expense increase on the debit side,
/// Liability/Equity/Revenue on the credit side.
pub(crate) fn signed_net(account_type: AccountType, total_debit: Decimal, total_credit: Decimal) -> Decimal {
    match account_type {
        AccountType::Asset | AccountType::Expense => total_debit - total_credit,
        AccountType::Liability | AccountType::Equity | AccountType::Revenue => total_credit - total_debit,
    }
}

/// Sentinel "beginning of time" lower bound for the cumulative P&L scan
/// `balance_sheet` uses to derive retained earnings. `NaiveDate::MIN` is
/// outside the range Postgres's `DATE` type can represent, so a
/// comfortably-early but valid date is used instead; no real ledger has
/// postings before it.
pub(crate) fn ledger_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1, 1, 1).expect("year 1 is a valid NaiveDate")
}
