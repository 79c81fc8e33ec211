//! The transactional seam between the posting engine and storage.
//!
//! §4.1/§4.2 give `LockManyForUpdate`, `ApplyDeltas`, `SaveJournal` and
//! `UpdateStatusAndLinks` an open database transaction to run inside so
//! the lock held in step 2 is still held when the balance update and
//! line insert commit in steps 5-6. `AccountStore`/`JournalStore` can't
//! express that by themselves without tying every method to a concrete
//! `sqlx::Transaction` (which the in-memory test double can't produce),
//! so this module generalizes the teacher's `DatabaseTransaction`
//! helper (`database/connection.rs`) and the `pool.begin()` /
//! `tx.commit()` pattern into an object-safe trait: `PostingStore::begin`
//! opens one, and every mutating step of the atomic write runs as a
//! method on the returned `PostingTransaction` so the posting engine is
//! identical whether it runs against Postgres or the in-memory double.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ledger_core::{Journal, JournalStatus, Result, TransactionLine};
use rust_decimal::Decimal;
use uuid::Uuid;

/// One open atomic write. Dropping without calling `commit` leaves no
/// trace — for Postgres this is `sqlx::Transaction`'s own rollback-on-
/// drop; the in-memory double stages its mutations and only applies
/// them in `commit`.
#[async_trait]
pub trait PostingTransaction: Send {
    /// §4.1 LockManyForUpdate: acquires exclusive locks on `account_ids`
    /// (which must already be sorted ascending by the caller) and
    /// returns their current balances. All-or-nothing: NotFound if any
    /// id is missing.
    async fn lock_accounts(
        &mut self,
        workplace_id: Uuid,
        account_ids_sorted: &[Uuid],
    ) -> Result<HashMap<Uuid, Decimal>>;

    /// §4.1 ApplyDeltas.
    async fn apply_deltas(
        &mut self,
        workplace_id: Uuid,
        deltas: &HashMap<Uuid, Decimal>,
        actor: &str,
        at: DateTime<Utc>,
    ) -> Result<()>;

    /// §4.2 SaveJournal's header-and-batch-lines write. `lines` already
    /// carry their running balances.
    async fn save_journal(&mut self, journal: &Journal, lines: &[TransactionLine]) -> Result<()>;

    /// §4.2 UpdateStatusAndLinks, the sole mutator of status and
    /// reversal links.
    async fn update_status_and_links(
        &mut self,
        journal_id: Uuid,
        status: JournalStatus,
        reversing_journal_id: Option<Uuid>,
        original_journal_id: Option<Uuid>,
        actor: &str,
        at: DateTime<Utc>,
    ) -> Result<()>;

    /// Re-reads a journal and its lines from within the open
    /// transaction, used by the reversal protocol's step 1.
    async fn find_journal_for_update(&mut self, workplace_id: Uuid, journal_id: Uuid) -> Result<Journal>;

    async fn find_lines_for_update(&mut self, journal_id: Uuid) -> Result<Vec<TransactionLine>>;

    /// Consumes the transaction, making all staged writes visible.
    async fn commit(self: Box<Self>) -> Result<()>;
}

/// Opens `PostingTransaction`s. Implemented once for Postgres
/// (`PgPostingStore`) and once for the in-memory double
/// (`InMemoryPostingStore`).
#[async_trait]
pub trait PostingStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn PostingTransaction + '_>>;
}
