//! Account store (C1): persists accounts, their type and currency, and
//! the materialized balance.

mod memory;
mod sqlx_store;

pub use memory::InMemoryAccountStore;
pub use sqlx_store::SqlxAccountStore;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ledger_core::{Account, Result};
use uuid::Uuid;

/// Non-transactional account operations. Row-level locking and bulk
/// balance updates, which must run inside the posting engine's open
/// transaction, live on `posting::PostingTransaction` instead — see
/// that module for why.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Inserts a new account. Conflict if `account.id` already exists;
    /// Validation if required fields are missing or the currency is
    /// unknown.
    async fn save(&self, account: &Account) -> Result<()>;

    async fn find_by_id(&self, workplace_id: Uuid, id: Uuid) -> Result<Account>;

    async fn find_by_user_facing_id(
        &self,
        workplace_id: Uuid,
        user_facing_id: &str,
    ) -> Result<Account>;

    /// Returns a map keyed by account id; ids with no matching row are
    /// simply omitted rather than causing an error.
    async fn find_many_by_id(
        &self,
        workplace_id: Uuid,
        ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Account>>;

    /// Ordered by name. `limit` is capped server-side at 100.
    async fn list(&self, workplace_id: Uuid, limit: i64, offset: i64) -> Result<Vec<Account>>;

    /// Permits name, description, parent and active; type, currency and
    /// workplace are immutable and any attempt to change them is a
    /// Validation error.
    async fn update(&self, account: &Account) -> Result<Account>;

    /// Idempotent: no error if the account is already inactive.
    async fn deactivate(
        &self,
        workplace_id: Uuid,
        id: Uuid,
        actor: &str,
        at: DateTime<Utc>,
    ) -> Result<()>;
}
