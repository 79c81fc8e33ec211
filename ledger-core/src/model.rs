//! Domain types for the ledger: currencies, exchange rates, accounts,
//! journals and their transaction lines. No I/O lives here — these are
//! the shapes the store and posting engine pass around.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

/// Three-letter currency reference, immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Currency {
    pub code: String,
    pub symbol: String,
    pub name: String,
    /// Decimal precision: 0 for zero-decimal currencies, up to 18 for crypto.
    pub precision: u32,
}

/// A point-in-time rate between two currencies, unique on
/// (from_code, to_code, effective_date).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRate {
    pub id: Uuid,
    pub from_code: String,
    pub to_code: String,
    pub effective_date: NaiveDate,
    pub rate: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ExchangeRate {
    /// The derived to->from rate. Callers must not persist this; it is
    /// always computed from the stored (from, to) tuple.
    pub fn inverse_rate(&self) -> Decimal {
        Decimal::ONE / self.rate
    }
}

/// Account classification, fixed by the sign rule in §4.3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountType {
    Asset,
    Liability,
    Equity,
    Revenue,
    Expense,
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AccountType::Asset => "asset",
            AccountType::Liability => "liability",
            AccountType::Equity => "equity",
            AccountType::Revenue => "revenue",
            AccountType::Expense => "expense",
        };
        f.write_str(s)
    }
}

impl FromStr for AccountType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asset" => Ok(AccountType::Asset),
            "liability" => Ok(AccountType::Liability),
            "equity" => Ok(AccountType::Equity),
            "revenue" => Ok(AccountType::Revenue),
            "expense" => Ok(AccountType::Expense),
            other => Err(Error::Validation(format!("unknown account type: {other}"))),
        }
    }
}

/// Debit or credit side of a transaction line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionType {
    Debit,
    Credit,
}

impl TransactionType {
    pub fn flipped(self) -> TransactionType {
        match self {
            TransactionType::Debit => TransactionType::Credit,
            TransactionType::Credit => TransactionType::Debit,
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransactionType::Debit => "debit",
            TransactionType::Credit => "credit",
        };
        f.write_str(s)
    }
}

impl FromStr for TransactionType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debit" => Ok(TransactionType::Debit),
            "credit" => Ok(TransactionType::Credit),
            other => Err(Error::Validation(format!("unknown transaction type: {other}"))),
        }
    }
}

/// Status of a journal. Reversal is the only recorded status change;
/// journals are otherwise immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JournalStatus {
    Posted,
    Reversed,
}

impl fmt::Display for JournalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JournalStatus::Posted => "posted",
            JournalStatus::Reversed => "reversed",
        };
        f.write_str(s)
    }
}

impl FromStr for JournalStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "posted" => Ok(JournalStatus::Posted),
            "reversed" => Ok(JournalStatus::Reversed),
            other => Err(Error::Validation(format!("unknown journal status: {other}"))),
        }
    }
}

/// An account owned by exactly one workplace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub workplace_id: Uuid,
    /// Optional user-facing identifier, unique within the workplace.
    pub user_facing_id: Option<String>,
    pub name: String,
    pub account_type: AccountType,
    pub currency_code: String,
    /// Self-referential parent; must belong to the same workplace.
    pub parent_account_id: Option<Uuid>,
    pub description: Option<String>,
    pub active: bool,
    /// Materialized running balance, the single source of truth per §5.
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A balanced atomic financial event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Journal {
    pub id: Uuid,
    pub workplace_id: Uuid,
    pub journal_date: NaiveDate,
    pub description: String,
    pub base_currency_code: String,
    pub status: JournalStatus,
    /// Populated on reversing journals, pointing back to the original.
    pub original_journal_id: Option<Uuid>,
    /// Populated on originals once reversed, pointing at the reversal.
    pub reversing_journal_id: Option<Uuid>,
    /// Aggregate "money moved" amount — see `aggregate_amount`.
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A single debit or credit line against one account, part of exactly
/// one journal. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionLine {
    pub id: Uuid,
    pub journal_id: Uuid,
    pub account_id: Uuid,
    /// Always strictly positive; sign is carried by `transaction_type`.
    pub amount: Decimal,
    pub transaction_type: TransactionType,
    pub currency_code: String,
    pub notes: Option<String>,
    /// Multi-currency case: the amount in `original_currency_code`.
    pub original_amount: Option<Decimal>,
    pub original_currency_code: Option<String>,
    pub exchange_rate_id: Option<Uuid>,
    /// Balance of `account_id` immediately after this line is applied.
    pub running_balance: Decimal,
    pub transaction_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A candidate line submitted to the posting engine, before identifiers
/// and running balances are assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateLine {
    pub account_id: Uuid,
    pub amount: Decimal,
    pub transaction_type: TransactionType,
    pub currency_code: String,
    pub notes: Option<String>,
    pub original_amount: Option<Decimal>,
    pub original_currency_code: Option<String>,
    pub exchange_rate_id: Option<Uuid>,
}
