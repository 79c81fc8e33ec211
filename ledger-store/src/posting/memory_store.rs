use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ledger_core::{Error, Journal, JournalStatus, Result, TransactionLine};
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::accounts::InMemoryAccountStore;
use crate::journals::InMemoryJournalStore;

use super::txn::{PostingStore, PostingTransaction};

/// In-memory `PostingStore`. There is no real row-level lock to take,
/// so `begin` instead acquires a single coarse mutex for the lifetime
/// of the transaction — every posting serializes against every other,
/// which is stricter than Postgres's per-row locking but preserves the
/// same observable guarantee (§5: overlapping writers never interleave)
/// for tests that don't care about lock granularity.
pub struct InMemoryPostingStore {
    accounts: Arc<InMemoryAccountStore>,
    journals: Arc<InMemoryJournalStore>,
    serializer: Arc<Mutex<()>>,
}

impl InMemoryPostingStore {
    pub fn new(accounts: Arc<InMemoryAccountStore>, journals: Arc<InMemoryJournalStore>) -> Self {
        Self {
            accounts,
            journals,
            serializer: Arc::new(Mutex::new(())),
        }
    }
}

#[async_trait]
impl PostingStore for InMemoryPostingStore {
    async fn begin(&self) -> Result<Box<dyn PostingTransaction + '_>> {
        let guard = self.serializer.clone().lock_owned().await;
        Ok(Box::new(InMemoryPostingTransaction {
            accounts: &self.accounts,
            journals: &self.journals,
            _guard: guard,
            staged_journal: None,
            staged_lines: Vec::new(),
            staged_deltas: None,
            staged_deltas_actor_at: None,
            staged_status_update: None,
        }))
    }
}

struct InMemoryPostingTransaction<'a> {
    accounts: &'a InMemoryAccountStore,
    journals: &'a InMemoryJournalStore,
    _guard: OwnedMutexGuard<()>,
    staged_journal: Option<Journal>,
    staged_lines: Vec<TransactionLine>,
    staged_deltas: Option<(Uuid, HashMap<Uuid, Decimal>)>,
    staged_deltas_actor_at: Option<DateTime<Utc>>,
    staged_status_update: Option<(Uuid, JournalStatus, Option<Uuid>, Option<Uuid>, DateTime<Utc>)>,
}

#[async_trait]
impl<'a> PostingTransaction for InMemoryPostingTransaction<'a> {
    async fn lock_accounts(
        &mut self,
        workplace_id: Uuid,
        account_ids_sorted: &[Uuid],
    ) -> Result<HashMap<Uuid, Decimal>> {
        self.accounts.snapshot_balances(workplace_id, account_ids_sorted)
    }

    async fn apply_deltas(
        &mut self,
        workplace_id: Uuid,
        deltas: &HashMap<Uuid, Decimal>,
        _actor: &str,
        at: DateTime<Utc>,
    ) -> Result<()> {
        self.staged_deltas = Some((workplace_id, deltas.clone()));
        self.staged_deltas_actor_at = Some(at);
        Ok(())
    }

    async fn save_journal(&mut self, journal: &Journal, lines: &[TransactionLine]) -> Result<()> {
        self.staged_journal = Some(journal.clone());
        self.staged_lines = lines.to_vec();
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
        self.staged_status_update = Some((journal_id, status, reversing_journal_id, original_journal_id, at));
        Ok(())
    }

    async fn find_journal_for_update(&mut self, workplace_id: Uuid, journal_id: Uuid) -> Result<Journal> {
        self.journals.find_journal_by_id(workplace_id, journal_id).await
    }

    async fn find_lines_for_update(&mut self, journal_id: Uuid) -> Result<Vec<TransactionLine>> {
        self.journals.find_transactions_by_journal_id(journal_id).await
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let this = *self;
        if let Some((workplace_id, deltas)) = this.staged_deltas {
            let at = this.staged_deltas_actor_at.unwrap_or_else(Utc::now);
            this.accounts.apply_deltas(workplace_id, &deltas, at)?;
        }
        if let Some(journal) = this.staged_journal {
            this.journals.insert_journal_and_lines(journal, this.staged_lines);
        }
        if let Some((journal_id, status, reversing_id, original_id, at)) = this.staged_status_update {
            this.journals
                .set_status_and_links(journal_id, status, reversing_id, original_id, at)?;
        }
        Ok(())
    }
}
