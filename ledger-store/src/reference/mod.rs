//! Reference finders: currencies and exchange rates are read-only to
//! the core (§2); their CRUD, beyond `SaveExchangeRate`, is external.

mod memory;
mod sqlx_store;

pub use memory::InMemoryReferenceStore;
pub use sqlx_store::SqlxReferenceStore;

use async_trait::async_trait;
use chrono::NaiveDate;
use ledger_core::{Currency, ExchangeRate, Result};

#[async_trait]
pub trait CurrencyFinder: Send + Sync {
    async fn get_currency(&self, code: &str) -> Result<Currency>;
    async fn list_currencies(&self) -> Result<Vec<Currency>>;
}

#[async_trait]
pub trait ExchangeRateFinder: Send + Sync {
    /// Looks up the rate effective on or before `as_of_date` (most
    /// recent if omitted, i.e. "today").
    async fn get_exchange_rate(
        &self,
        from_code: &str,
        to_code: &str,
        as_of_date: Option<NaiveDate>,
    ) -> Result<ExchangeRate>;

    /// Conflict if the (from, to, effective_date) tuple already exists.
    async fn save_exchange_rate(&self, rate: &ExchangeRate) -> Result<()>;
}
