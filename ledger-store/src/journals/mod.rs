//! Journal/transaction store (C2): persists journals and their
//! transaction lines, and serves the listing/reporting reads over them.
//! The atomic write path (SaveJournal, UpdateStatusAndLinks) lives on
//! `posting::PostingTransaction` since both must run inside the posting
//! engine's single open database transaction — see that module.

mod memory;
mod sqlx_store;

pub use memory::InMemoryJournalStore;
pub use sqlx_store::SqlxJournalStore;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use ledger_core::cursor::{Cursor, Page};
use ledger_core::{Journal, Result, TransactionLine};
use uuid::Uuid;

#[async_trait]
pub trait JournalStore: Send + Sync {
    async fn find_journal_by_id(&self, workplace_id: Uuid, id: Uuid) -> Result<Journal>;

    async fn find_transactions_by_journal_id(&self, journal_id: Uuid) -> Result<Vec<TransactionLine>>;

    /// Batch form: includes an empty slice for any journal id with no lines.
    async fn find_transactions_by_journal_ids(
        &self,
        journal_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<TransactionLine>>>;

    /// Sorted (journal_date DESC, created_at DESC). When
    /// `include_reversals` is false, excludes journals in Reversed
    /// status and any journal participating in a reversal pair
    /// (original_journal_id or reversing_journal_id set).
    async fn list_journals_by_workplace(
        &self,
        workplace_id: Uuid,
        limit: i64,
        cursor: Option<Cursor>,
        include_reversals: bool,
    ) -> Result<Page<Journal>>;

    /// Sorted (journal_date DESC, transaction created_at DESC), joined
    /// against the owning journal for the ordering key and workplace
    /// filter.
    async fn list_transactions_by_account(
        &self,
        workplace_id: Uuid,
        account_id: Uuid,
        limit: i64,
        cursor: Option<Cursor>,
    ) -> Result<Page<TransactionLine>>;

    /// Updates date/description only; status and reversal links are
    /// immutable through this path.
    async fn update_journal(
        &self,
        workplace_id: Uuid,
        journal_id: Uuid,
        date: Option<NaiveDate>,
        description: Option<String>,
    ) -> Result<Journal>;
}
