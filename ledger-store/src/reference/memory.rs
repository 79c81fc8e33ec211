use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use ledger_core::{Currency, Error, ExchangeRate, Result};

use super::{CurrencyFinder, ExchangeRateFinder};

#[derive(Default)]
pub struct InMemoryReferenceStore {
    currencies: RwLock<HashMap<String, Currency>>,
    rates: RwLock<Vec<ExchangeRate>>,
}

impl InMemoryReferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_currency(&self, currency: Currency) {
        self.currencies.write().unwrap().insert(currency.code.clone(), currency);
    }
}

#[async_trait]
impl CurrencyFinder for InMemoryReferenceStore {
    async fn get_currency(&self, code: &str) -> Result<Currency> {
        self.currencies
            .read()
            .unwrap()
            .get(code)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("currency {code} not found")))
    }

    async fn list_currencies(&self) -> Result<Vec<Currency>> {
        let mut out: Vec<Currency> = self.currencies.read().unwrap().values().cloned().collect();
        out.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(out)
    }
}

#[async_trait]
impl ExchangeRateFinder for InMemoryReferenceStore {
    async fn get_exchange_rate(
        &self,
        from_code: &str,
        to_code: &str,
        as_of_date: Option<NaiveDate>,
    ) -> Result<ExchangeRate> {
        let as_of = as_of_date.unwrap_or_else(|| Utc::now().date_naive());
        self.rates
            .read()
            .unwrap()
            .iter()
            .filter(|r| r.from_code == from_code && r.to_code == to_code && r.effective_date <= as_of)
            .max_by_key(|r| r.effective_date)
            .cloned()
            .ok_or_else(|| {
                Error::NotFound(format!("no exchange rate {from_code}->{to_code} as of {as_of}"))
            })
    }

    async fn save_exchange_rate(&self, rate: &ExchangeRate) -> Result<()> {
        let mut rates = self.rates.write().unwrap();
        if rates
            .iter()
            .any(|r| r.from_code == rate.from_code && r.to_code == rate.to_code && r.effective_date == rate.effective_date)
        {
            return Err(Error::Conflict(format!(
                "exchange rate {}->{} on {} already exists",
                rate.from_code, rate.to_code, rate.effective_date
            )));
        }
        rates.push(rate.clone());
        Ok(())
    }
}
