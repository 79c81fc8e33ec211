//! ledger-core — domain model for a multi-tenant double-entry
//! accounting ledger.
//!
//! This crate has no I/O: it carries the entity shapes (accounts,
//! journals, transaction lines, currencies, exchange rates), the typed
//! `Error`, the sign rule and aggregate-amount functions from the
//! posting engine, and the cursor codec used for stable list
//! pagination. `ledger-store` builds the Postgres-backed engine on top
//! of these types.

pub mod cursor;
pub mod error;
pub mod model;
pub mod sign;

pub use error::{Error, Result};
pub use model::{
    Account, AccountType, CandidateLine, Currency, ExchangeRate, Journal, JournalStatus,
    TransactionLine, TransactionType,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
