use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use ledger_core::cursor::{paginate, Cursor, Page};
use ledger_core::{Error, Journal, JournalStatus, Result, TransactionLine, TransactionType};
use rust_decimal::Decimal;
use uuid::Uuid;

use super::JournalStore;

const DEFAULT_LIST_LIMIT: i64 = 20;
const MAX_LIST_LIMIT: i64 = 100;

fn date_at_midnight_utc(date: NaiveDate) -> chrono::DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).expect("midnight is always valid"))
}

/// In-memory test double for `JournalStore`.
#[derive(Default)]
pub struct InMemoryJournalStore {
    journals: RwLock<HashMap<Uuid, Journal>>,
    lines: RwLock<HashMap<Uuid, Vec<TransactionLine>>>,
}

impl InMemoryJournalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Used by `posting::memory_store`'s `PostingTransaction` to emulate
    /// C2's batched journal-header-plus-lines insert.
    pub(crate) fn insert_journal_and_lines(&self, journal: Journal, lines: Vec<TransactionLine>) {
        let journal_id = journal.id;
        self.journals.write().unwrap().insert(journal_id, journal);
        self.lines.write().unwrap().insert(journal_id, lines);
    }

    /// Used by `reporting::memory`'s in-memory aggregator to scan the
    /// full eligible transaction log (§4.5 excludes Reversed journals
    /// and journals that are themselves a reversal) without the 100-row
    /// cap `list_journals_by_workplace` applies for paginated reads.
    pub(crate) fn eligible_lines(
        &self,
        workplace_id: Uuid,
        on_or_after: Option<NaiveDate>,
        on_or_before: NaiveDate,
    ) -> Vec<(Uuid, TransactionType, Decimal)> {
        let journals = self.journals.read().unwrap();
        let lines = self.lines.read().unwrap();

        let mut out = Vec::new();
        for journal in journals.values() {
            if journal.workplace_id != workplace_id {
                continue;
            }
            if journal.status == JournalStatus::Reversed || journal.original_journal_id.is_some() {
                continue;
            }
            if journal.journal_date > on_or_before {
                continue;
            }
            if let Some(from) = on_or_after {
                if journal.journal_date < from {
                    continue;
                }
            }
            if let Some(journal_lines) = lines.get(&journal.id) {
                for line in journal_lines {
                    out.push((line.account_id, line.transaction_type, line.amount));
                }
            }
        }
        out
    }

    /// Used by `posting::memory_store`'s `PostingTransaction` to emulate
    /// `UpdateStatusAndLinks`.
    pub(crate) fn set_status_and_links(
        &self,
        journal_id: Uuid,
        status: JournalStatus,
        reversing_journal_id: Option<Uuid>,
        original_journal_id: Option<Uuid>,
        at: chrono::DateTime<Utc>,
    ) -> Result<()> {
        let mut journals = self.journals.write().unwrap();
        let journal = journals
            .get_mut(&journal_id)
            .ok_or_else(|| Error::NotFound(format!("journal {journal_id} not found")))?;
        journal.status = status;
        if reversing_journal_id.is_some() {
            journal.reversing_journal_id = reversing_journal_id;
        }
        if original_journal_id.is_some() {
            journal.original_journal_id = original_journal_id;
        }
        journal.updated_at = at;
        Ok(())
    }
}

#[async_trait]
impl JournalStore for InMemoryJournalStore {
    async fn find_journal_by_id(&self, workplace_id: Uuid, id: Uuid) -> Result<Journal> {
        self.journals
            .read()
            .unwrap()
            .get(&id)
            .filter(|j| j.workplace_id == workplace_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("journal {id} not found")))
    }

    async fn find_transactions_by_journal_id(&self, journal_id: Uuid) -> Result<Vec<TransactionLine>> {
        Ok(self.lines.read().unwrap().get(&journal_id).cloned().unwrap_or_default())
    }

    async fn find_transactions_by_journal_ids(
        &self,
        journal_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<TransactionLine>>> {
        let lines = self.lines.read().unwrap();
        Ok(journal_ids
            .iter()
            .map(|id| (*id, lines.get(id).cloned().unwrap_or_default()))
            .collect())
    }

    async fn list_journals_by_workplace(
        &self,
        workplace_id: Uuid,
        limit: i64,
        cursor: Option<Cursor>,
        include_reversals: bool,
    ) -> Result<Page<Journal>> {
        let limit = if limit <= 0 { DEFAULT_LIST_LIMIT } else { limit.min(MAX_LIST_LIMIT) };

        let journals = self.journals.read().unwrap();
        let mut matching: Vec<Journal> = journals
            .values()
            .filter(|j| j.workplace_id == workplace_id)
            .filter(|j| {
                include_reversals
                    || (j.status != JournalStatus::Reversed
                        && j.original_journal_id.is_none()
                        && j.reversing_journal_id.is_none())
            })
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            (b.journal_date, b.created_at).cmp(&(a.journal_date, a.created_at))
        });

        if let Some(c) = cursor {
            matching.retain(|j| (date_at_midnight_utc(j.journal_date), j.created_at) < (c.date, c.created_at));
        }

        matching.truncate(limit as usize + 1);
        Ok(paginate(matching, limit as usize, |j| {
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

        let journals = self.journals.read().unwrap();
        let lines = self.lines.read().unwrap();

        let mut matching: Vec<(NaiveDate, TransactionLine)> = Vec::new();
        for journal in journals.values().filter(|j| j.workplace_id == workplace_id) {
            if let Some(journal_lines) = lines.get(&journal.id) {
                for line in journal_lines {
                    if line.account_id == account_id {
                        matching.push((journal.journal_date, line.clone()));
                    }
                }
            }
        }

        matching.sort_by(|(da, a), (db, b)| (db, b.created_at).cmp(&(da, a.created_at)));

        if let Some(c) = cursor {
            matching.retain(|(d, l)| (date_at_midnight_utc(*d), l.created_at) < (c.date, c.created_at));
        }

        matching.truncate(limit as usize + 1);
        let dated_lines: Vec<TransactionLine> = matching.iter().map(|(_, l)| l.clone()).collect();
        let dates: HashMap<Uuid, NaiveDate> = matching.iter().map(|(d, l)| (l.id, *d)).collect();

        Ok(paginate(dated_lines, limit as usize, |line| {
            let date = dates.get(&line.id).copied().unwrap_or_else(|| line.transaction_date.date_naive());
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
        let mut journals = self.journals.write().unwrap();
        let journal = journals
            .get_mut(&journal_id)
            .filter(|j| j.workplace_id == workplace_id)
            .ok_or_else(|| Error::NotFound(format!("journal {journal_id} not found")))?;

        if let Some(date) = date {
            journal.journal_date = date;
        }
        if let Some(description) = description {
            journal.description = description;
        }
        journal.updated_at = Utc::now();
        Ok(journal.clone())
    }
}
