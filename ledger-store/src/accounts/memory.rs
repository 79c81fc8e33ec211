use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ledger_core::{Account, Error, Result};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::reference::CurrencyFinder;

use super::AccountStore;

const DEFAULT_LIST_LIMIT: i64 = 20;
const MAX_LIST_LIMIT: i64 = 100;

/// In-memory test double for `AccountStore`, mirroring the teacher's
/// `InMemoryLedgerRepository` shape (a `RwLock`-guarded map) so engine
/// tests can run without Postgres.
pub struct InMemoryAccountStore {
    accounts: RwLock<HashMap<Uuid, Account>>,
    currencies: Arc<dyn CurrencyFinder>,
}

impl InMemoryAccountStore {
    pub fn new(currencies: Arc<dyn CurrencyFinder>) -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            currencies,
        }
    }

    /// §4.1 Save/Update's "currency/workplace unknown" validation: the
    /// currency must be registered, and a parent account, if given,
    /// must exist in the same workplace.
    async fn validate_references(&self, account: &Account) -> Result<()> {
        if account.name.trim().is_empty() {
            return Err(Error::Validation("account name is required".to_string()));
        }
        self.currencies.get_currency(&account.currency_code).await.map_err(|_| {
            Error::Validation(format!("unknown currency code {}", account.currency_code))
        })?;
        if let Some(parent_id) = account.parent_account_id {
            let accounts = self.accounts.read().unwrap();
            let parent = accounts
                .get(&parent_id)
                .ok_or_else(|| Error::Validation(format!("parent account {parent_id} not found")))?;
            if parent.workplace_id != account.workplace_id {
                return Err(Error::Validation(
                    "parent account must belong to the same workplace".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Used by `posting::memory_store`'s `PostingTransaction` to emulate
    /// `LockManyForUpdate`: the in-memory double has no real row locks,
    /// so serialization instead comes from the posting store's own
    /// mutex — this just reads the current balances, failing all-or-
    /// nothing if any id is missing.
    pub(crate) fn snapshot_balances(
        &self,
        workplace_id: Uuid,
        ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Decimal>> {
        let accounts = self.accounts.read().unwrap();
        let mut out = HashMap::with_capacity(ids.len());
        for id in ids {
            let account = accounts
                .get(id)
                .filter(|a| a.workplace_id == workplace_id)
                .ok_or_else(|| Error::NotFound(format!("account {id} not found")))?;
            out.insert(*id, account.balance);
        }
        Ok(out)
    }

    /// Used by `reporting::memory`'s in-memory aggregator, which must
    /// scan every account in the workplace rather than the 100-row page
    /// `list` caps reads at.
    pub(crate) fn all_accounts(&self, workplace_id: Uuid) -> Vec<Account> {
        self.accounts
            .read()
            .unwrap()
            .values()
            .filter(|a| a.workplace_id == workplace_id)
            .cloned()
            .collect()
    }

    /// Used by `posting::memory_store`'s `PostingTransaction` to emulate
    /// `ApplyDeltas`.
    pub(crate) fn apply_deltas(
        &self,
        workplace_id: Uuid,
        deltas: &HashMap<Uuid, Decimal>,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let mut accounts = self.accounts.write().unwrap();
        for (id, delta) in deltas {
            if delta.is_zero() {
                continue;
            }
            let account = accounts
                .get_mut(id)
                .filter(|a| a.workplace_id == workplace_id)
                .ok_or_else(|| Error::NotFound(format!("account {id} not found")))?;
            if !account.active {
                return Err(Error::NotFound(format!("account {id} not found or inactive")));
            }
            account.balance += *delta;
            account.updated_at = at;
        }
        Ok(())
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn save(&self, account: &Account) -> Result<()> {
        self.validate_references(account).await?;
        let mut accounts = self.accounts.write().unwrap();
        if accounts.contains_key(&account.id) {
            return Err(Error::Conflict(format!("account {} already exists", account.id)));
        }
        accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn find_by_id(&self, workplace_id: Uuid, id: Uuid) -> Result<Account> {
        let accounts = self.accounts.read().unwrap();
        accounts
            .get(&id)
            .filter(|a| a.workplace_id == workplace_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("account {id} not found")))
    }

    async fn find_by_user_facing_id(
        &self,
        workplace_id: Uuid,
        user_facing_id: &str,
    ) -> Result<Account> {
        let accounts = self.accounts.read().unwrap();
        accounts
            .values()
            .find(|a| {
                a.workplace_id == workplace_id
                    && a.user_facing_id.as_deref() == Some(user_facing_id)
            })
            .cloned()
            .ok_or_else(|| {
                Error::NotFound(format!("account with user_facing_id {user_facing_id} not found"))
            })
    }

    async fn find_many_by_id(
        &self,
        workplace_id: Uuid,
        ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Account>> {
        let accounts = self.accounts.read().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| {
                accounts
                    .get(id)
                    .filter(|a| a.workplace_id == workplace_id)
                    .map(|a| (*id, a.clone()))
            })
            .collect())
    }

    async fn list(&self, workplace_id: Uuid, limit: i64, offset: i64) -> Result<Vec<Account>> {
        let limit = if limit <= 0 { DEFAULT_LIST_LIMIT } else { limit.min(MAX_LIST_LIMIT) } as usize;
        let offset = offset.max(0) as usize;

        let accounts = self.accounts.read().unwrap();
        let mut matching: Vec<Account> = accounts
            .values()
            .filter(|a| a.workplace_id == workplace_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(matching.into_iter().skip(offset).take(limit).collect())
    }

    async fn update(&self, account: &Account) -> Result<Account> {
        if let Some(parent_id) = account.parent_account_id {
            let accounts = self.accounts.read().unwrap();
            let parent = accounts
                .get(&parent_id)
                .ok_or_else(|| Error::Validation(format!("parent account {parent_id} not found")))?;
            if parent.workplace_id != account.workplace_id {
                return Err(Error::Validation(
                    "parent account must belong to the same workplace".to_string(),
                ));
            }
        }

        let mut accounts = self.accounts.write().unwrap();
        let existing = accounts
            .get(&account.id)
            .filter(|a| a.workplace_id == account.workplace_id)
            .ok_or_else(|| Error::NotFound(format!("account {} not found", account.id)))?;

        if existing.account_type != account.account_type
            || existing.currency_code != account.currency_code
        {
            return Err(Error::Validation(
                "account type and currency are immutable".to_string(),
            ));
        }

        let mut updated = existing.clone();
        updated.name = account.name.clone();
        updated.description = account.description.clone();
        updated.parent_account_id = account.parent_account_id;
        updated.active = account.active;
        updated.updated_at = account.updated_at;
        accounts.insert(updated.id, updated.clone());
        Ok(updated)
    }

    async fn deactivate(
        &self,
        workplace_id: Uuid,
        id: Uuid,
        _actor: &str,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let mut accounts = self.accounts.write().unwrap();
        let account = accounts
            .get_mut(&id)
            .filter(|a| a.workplace_id == workplace_id)
            .ok_or_else(|| Error::NotFound(format!("account {id} not found")))?;
        account.active = false;
        account.updated_at = at;
        Ok(())
    }
}
