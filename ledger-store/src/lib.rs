//! ledger-store — the Postgres-backed engine for the multi-tenant
//! double-entry ledger: repositories for accounts (C1) and
//! journals/transactions (C2), the posting engine (C3), the reversal
//! protocol (C4), the reporting aggregator (C5), and the reference
//! finders for currencies and exchange rates. Every repository trait
//! also has an in-memory implementation for tests that don't need a
//! live database.

pub mod accounts;
mod cancellation;
pub mod config;
pub mod journals;
pub mod posting;
pub mod reference;
pub mod reporting;

pub use accounts::{AccountStore, InMemoryAccountStore, SqlxAccountStore};
pub use config::LedgerConfig;
pub use journals::{InMemoryJournalStore, JournalStore, SqlxJournalStore};
pub use posting::{
    InMemoryPostingStore, PgPostingStore, PostJournalRequest, PostingEngine, PostingStore,
    PostingTransaction, ReversalProtocol,
};
pub use reference::{
    CurrencyFinder, ExchangeRateFinder, InMemoryReferenceStore, SqlxReferenceStore,
};
pub use reporting::{
    BalanceSheet, InMemoryReportingAggregator, ProfitAndLoss, ReportingAggregator,
    SqlxReportingAggregator, TrialBalance,
};
