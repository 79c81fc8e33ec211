//! Posting engine (C3): validates a candidate journal, computes
//! per-account deltas and per-line running balances, and orchestrates
//! the atomic write described in §4.3. `validate_and_prepare` and
//! `write_prepared` are split apart so the reversal protocol can run
//! both the re-post of the inverse journal and the status-link update
//! inside one database transaction instead of two (see
//! `reversal::ReversalProtocol`).

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use ledger_core::sign::{aggregate_amount, signed_amount};
use ledger_core::{AccountType, CandidateLine, Error, Journal, JournalStatus, Result, TransactionLine};
use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::accounts::AccountStore;
use crate::cancellation::run_cancellable;
use crate::reference::{CurrencyFinder, ExchangeRateFinder};

use super::txn::{PostingStore, PostingTransaction};

/// A candidate journal submitted to `PostingEngine::post_journal`.
pub struct PostJournalRequest {
    pub workplace_id: Uuid,
    pub actor: String,
    pub journal_date: NaiveDate,
    pub description: String,
    pub base_currency_code: String,
    pub lines: Vec<CandidateLine>,
}

/// A validated candidate, ready for the atomic write. Holds everything
/// `write_prepared` needs: the journal header, the lines (running
/// balances still zeroed, sorted into their deterministic write
/// order), the sorted distinct account id set to lock, the per-account
/// delta, and each affected account's type (needed to sign a line's
/// amount when the per-line running balance cursor advances).
pub(crate) struct PreparedJournal {
    pub journal: Journal,
    pub lines: Vec<TransactionLine>,
    pub account_ids_sorted: Vec<Uuid>,
    pub account_types: HashMap<Uuid, AccountType>,
    pub deltas: HashMap<Uuid, Decimal>,
    pub actor: String,
}

/// Orchestrates §4.3: validation against the current (unlocked) account
/// state, then the atomic write inside a single database transaction.
pub struct PostingEngine {
    accounts: Arc<dyn AccountStore>,
    posting_store: Arc<dyn PostingStore>,
    currencies: Arc<dyn CurrencyFinder>,
    exchange_rates: Arc<dyn ExchangeRateFinder>,
}

impl PostingEngine {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        posting_store: Arc<dyn PostingStore>,
        currencies: Arc<dyn CurrencyFinder>,
        exchange_rates: Arc<dyn ExchangeRateFinder>,
    ) -> Self {
        Self {
            accounts,
            posting_store,
            currencies,
            exchange_rates,
        }
    }

    #[instrument(skip(self, req), fields(workplace_id = %req.workplace_id, lines = req.lines.len()))]
    pub async fn post_journal(&self, req: PostJournalRequest) -> Result<Journal> {
        self.post_journal_cancellable(req, None).await
    }

    /// As `post_journal`, but aborts (rolling back the open transaction
    /// by dropping it) if `cancellation` fires before the write commits.
    pub async fn post_journal_cancellable(
        &self,
        req: PostJournalRequest,
        cancellation: Option<&CancellationToken>,
    ) -> Result<Journal> {
        let at = Utc::now();
        let mut prepared = self.validate_and_prepare(req, at).await?;

        let journal = run_cancellable(cancellation, async {
            let mut tx = self.posting_store.begin().await?;
            let journal = Self::write_prepared(&mut *tx, &mut prepared, at).await?;
            tx.commit().await?;
            Ok(journal)
        })
        .await?;

        info!(journal_id = %journal.id, amount = %journal.amount, "journal posted");
        Ok(journal)
    }

    /// §4.3 validation steps 1-5, run against a point-in-time read of
    /// the affected accounts (not yet locked — the lock is taken in
    /// `write_prepared`, inside the open transaction, per §5's mutator
    /// discipline).
    pub(crate) async fn validate_and_prepare(
        &self,
        req: PostJournalRequest,
        at: DateTime<Utc>,
    ) -> Result<PreparedJournal> {
        let PostJournalRequest {
            workplace_id,
            actor,
            journal_date,
            description,
            base_currency_code,
            lines,
        } = req;

        if lines.len() < 2 {
            return Err(Error::Validation(
                "a journal needs at least two transaction lines".to_string(),
            ));
        }
        for line in &lines {
            if line.amount <= Decimal::ZERO {
                return Err(Error::Validation(
                    "transaction amount must be strictly positive".to_string(),
                ));
            }
        }
        Self::validate_currency_shape(&base_currency_code, &lines)?;

        let mut account_ids_sorted: Vec<Uuid> = lines.iter().map(|l| l.account_id).collect();
        account_ids_sorted.sort();
        account_ids_sorted.dedup();

        let accounts = self
            .accounts
            .find_many_by_id(workplace_id, &account_ids_sorted)
            .await?;
        for id in &account_ids_sorted {
            let account = accounts
                .get(id)
                .ok_or_else(|| Error::NotFound(format!("account {id} not found")))?;
            if !account.active {
                return Err(Error::Validation(format!(
                    "account {id} is inactive and cannot be posted against"
                )));
            }
            if account.currency_code != base_currency_code {
                return Err(Error::Validation(format!(
                    "account {id} currency {} does not match journal base currency {base_currency_code}",
                    account.currency_code
                )));
            }
        }

        let balance: Decimal = lines
            .iter()
            .map(|line| {
                signed_amount(
                    accounts[&line.account_id].account_type,
                    line.transaction_type,
                    line.amount,
                )
            })
            .sum();
        if !balance.is_zero() {
            return Err(Error::Validation(format!(
                "journal does not balance: signed amounts sum to {balance}"
            )));
        }

        self.validate_exchange_rates(&base_currency_code, journal_date, &lines)
            .await?;

        let journal_id = Uuid::new_v4();
        let aggregate = aggregate_amount(lines.iter().map(|line| {
            let account = &accounts[&line.account_id];
            (account.account_type, line.transaction_type, line.amount)
        }));

        let mut prepared_lines: Vec<TransactionLine> = lines
            .into_iter()
            .map(|line| TransactionLine {
                id: Uuid::new_v4(),
                journal_id,
                account_id: line.account_id,
                amount: line.amount,
                transaction_type: line.transaction_type,
                currency_code: base_currency_code.clone(),
                notes: line.notes,
                original_amount: line.original_amount,
                original_currency_code: line.original_currency_code,
                exchange_rate_id: line.exchange_rate_id,
                running_balance: Decimal::ZERO,
                transaction_date: at,
                created_at: at,
                updated_at: at,
            })
            .collect();

        // §4.3 step 3: sort by transaction id so running-balance
        // assignment is reproducible regardless of submission order.
        prepared_lines.sort_by_key(|l| l.id);

        let account_types: HashMap<Uuid, AccountType> = accounts
            .iter()
            .map(|(id, account)| (*id, account.account_type))
            .collect();

        let mut deltas: HashMap<Uuid, Decimal> = HashMap::new();
        for line in &prepared_lines {
            let signed = signed_amount(account_types[&line.account_id], line.transaction_type, line.amount);
            *deltas.entry(line.account_id).or_insert(Decimal::ZERO) += signed;
        }

        let journal = Journal {
            id: journal_id,
            workplace_id,
            journal_date,
            description,
            base_currency_code,
            status: JournalStatus::Posted,
            original_journal_id: None,
            reversing_journal_id: None,
            amount: aggregate,
            created_at: at,
            updated_at: at,
        };

        Ok(PreparedJournal {
            journal,
            lines: prepared_lines,
            account_ids_sorted,
            account_types,
            deltas,
            actor,
        })
    }

    /// §4.3 atomic write, steps 2-5: lock accounts, assign per-line
    /// running balances from the locked pre-write balances, apply
    /// deltas, then batch-insert the journal and lines. Does not
    /// commit — the caller owns the transaction's lifetime so the
    /// reversal protocol can fold its own status-link update into the
    /// same commit.
    pub(crate) async fn write_prepared(
        tx: &mut (dyn PostingTransaction + '_),
        prepared: &mut PreparedJournal,
        at: DateTime<Utc>,
    ) -> Result<Journal> {
        let locked_balances = tx
            .lock_accounts(prepared.journal.workplace_id, &prepared.account_ids_sorted)
            .await?;

        let mut cursors = locked_balances;
        for line in prepared.lines.iter_mut() {
            let account_type = prepared.account_types[&line.account_id];
            let signed = signed_amount(account_type, line.transaction_type, line.amount);
            let cursor = cursors.entry(line.account_id).or_insert(Decimal::ZERO);
            *cursor += signed;
            line.running_balance = *cursor;
        }

        tx.apply_deltas(prepared.journal.workplace_id, &prepared.deltas, &prepared.actor, at)
            .await?;
        tx.save_journal(&prepared.journal, &prepared.lines).await?;

        Ok(prepared.journal.clone())
    }

    fn validate_currency_shape(base_currency_code: &str, lines: &[CandidateLine]) -> Result<()> {
        for line in lines {
            if line.currency_code != base_currency_code {
                return Err(Error::Validation(format!(
                    "line currency {} does not match journal base currency {base_currency_code}",
                    line.currency_code
                )));
            }

            let has_original_amount = line.original_amount.is_some();
            let has_original_currency = line.original_currency_code.is_some();
            let has_rate = line.exchange_rate_id.is_some();

            if has_original_amount || has_original_currency || has_rate {
                if !(has_original_amount && has_original_currency && has_rate) {
                    return Err(Error::Validation(
                        "multi-currency lines must carry original amount, original currency and exchange rate together"
                            .to_string(),
                    ));
                }
                if line.original_currency_code.as_deref() == Some(base_currency_code) {
                    return Err(Error::Validation(
                        "original currency must differ from the journal base currency".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    async fn validate_exchange_rates(
        &self,
        base_currency_code: &str,
        journal_date: NaiveDate,
        lines: &[CandidateLine],
    ) -> Result<()> {
        let multi_currency_lines: Vec<&CandidateLine> =
            lines.iter().filter(|l| l.exchange_rate_id.is_some()).collect();
        if multi_currency_lines.is_empty() {
            return Ok(());
        }

        let base_currency = self.currencies.get_currency(base_currency_code).await?;

        for line in multi_currency_lines {
            let original_amount = line.original_amount.expect("checked by validate_currency_shape");
            let original_currency = line
                .original_currency_code
                .as_deref()
                .expect("checked by validate_currency_shape");
            let exchange_rate_id = line.exchange_rate_id.expect("checked by validate_currency_shape");

            let rate = self
                .exchange_rates
                .get_exchange_rate(original_currency, base_currency_code, Some(journal_date))
                .await?;
            if rate.id != exchange_rate_id {
                return Err(Error::Validation(format!(
                    "line references exchange rate {exchange_rate_id}, but the rate effective on {journal_date} is {}",
                    rate.id
                )));
            }

            let expected = (original_amount * rate.rate).round_dp(base_currency.precision);
            if expected != line.amount {
                warn!(
                    account_id = %line.account_id,
                    expected = %expected,
                    actual = %line.amount,
                    "multi-currency line amount does not match converted original amount"
                );
                return Err(Error::Validation(format!(
                    "line amount {} does not match {original_amount} {original_currency} converted at {} ({expected})",
                    line.amount, rate.rate
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::InMemoryAccountStore;
    use crate::journals::InMemoryJournalStore;
    use crate::posting::InMemoryPostingStore;
    use crate::reference::InMemoryReferenceStore;
    use ledger_core::{Account, AccountType, Currency, TransactionType};
    use rust_decimal_macros::dec;

    fn account(workplace_id: Uuid, account_type: AccountType, currency: &str, balance: Decimal) -> Account {
        let now = Utc::now();
        Account {
            id: Uuid::new_v4(),
            workplace_id,
            user_facing_id: None,
            name: format!("{account_type}"),
            account_type,
            currency_code: currency.to_string(),
            parent_account_id: None,
            description: None,
            active: true,
            balance,
            created_at: now,
            updated_at: now,
        }
    }

    async fn setup() -> (PostingEngine, Arc<InMemoryAccountStore>, Uuid, Account, Account) {
        let workplace_id = Uuid::new_v4();
        let reference = Arc::new(InMemoryReferenceStore::new());
        reference.seed_currency(Currency {
            code: "USD".to_string(),
            symbol: "$".to_string(),
            name: "US Dollar".to_string(),
            precision: 2,
        });
        let accounts = Arc::new(InMemoryAccountStore::new(reference.clone()));
        let journals = Arc::new(InMemoryJournalStore::new());
        let posting_store = Arc::new(InMemoryPostingStore::new(accounts.clone(), journals.clone()));

        let cash = account(workplace_id, AccountType::Asset, "USD", Decimal::ZERO);
        let revenue = account(workplace_id, AccountType::Revenue, "USD", Decimal::ZERO);
        accounts.save(&cash).await.unwrap();
        accounts.save(&revenue).await.unwrap();

        let engine = PostingEngine::new(accounts.clone(), posting_store, reference.clone(), reference);
        (engine, accounts, workplace_id, cash, revenue)
    }

    #[tokio::test]
    async fn balanced_two_line_journal_updates_balances_and_running_balances() {
        let (engine, accounts, workplace_id, cash, revenue) = setup().await;

        let journal = engine
            .post_journal(PostJournalRequest {
                workplace_id,
                actor: "tester".to_string(),
                journal_date: Utc::now().date_naive(),
                description: "cash sale".to_string(),
                base_currency_code: "USD".to_string(),
                lines: vec![
                    CandidateLine {
                        account_id: cash.id,
                        amount: dec!(100.00),
                        transaction_type: TransactionType::Debit,
                        currency_code: "USD".to_string(),
                        notes: None,
                        original_amount: None,
                        original_currency_code: None,
                        exchange_rate_id: None,
                    },
                    CandidateLine {
                        account_id: revenue.id,
                        amount: dec!(100.00),
                        transaction_type: TransactionType::Credit,
                        currency_code: "USD".to_string(),
                        notes: None,
                        original_amount: None,
                        original_currency_code: None,
                        exchange_rate_id: None,
                    },
                ],
            })
            .await
            .expect("balanced journal posts");

        assert_eq!(journal.amount, dec!(100.00));

        let cash_after = accounts.find_by_id(workplace_id, cash.id).await.unwrap();
        let revenue_after = accounts.find_by_id(workplace_id, revenue.id).await.unwrap();
        assert_eq!(cash_after.balance, dec!(100.00));
        assert_eq!(revenue_after.balance, dec!(100.00));
    }

    #[tokio::test]
    async fn imbalanced_journal_is_rejected_before_any_write() {
        let (engine, accounts, workplace_id, cash, revenue) = setup().await;

        let result = engine
            .post_journal(PostJournalRequest {
                workplace_id,
                actor: "tester".to_string(),
                journal_date: Utc::now().date_naive(),
                description: "bad entry".to_string(),
                base_currency_code: "USD".to_string(),
                lines: vec![
                    CandidateLine {
                        account_id: cash.id,
                        amount: dec!(100.00),
                        transaction_type: TransactionType::Debit,
                        currency_code: "USD".to_string(),
                        notes: None,
                        original_amount: None,
                        original_currency_code: None,
                        exchange_rate_id: None,
                    },
                    CandidateLine {
                        account_id: revenue.id,
                        amount: dec!(99.00),
                        transaction_type: TransactionType::Credit,
                        currency_code: "USD".to_string(),
                        notes: None,
                        original_amount: None,
                        original_currency_code: None,
                        exchange_rate_id: None,
                    },
                ],
            })
            .await;

        assert!(matches!(result, Err(Error::Validation(_))));

        let cash_after = accounts.find_by_id(workplace_id, cash.id).await.unwrap();
        assert_eq!(cash_after.balance, Decimal::ZERO, "no partial write on validation failure");
    }

    #[tokio::test]
    async fn single_line_journal_is_rejected() {
        let (engine, _accounts, workplace_id, cash, _revenue) = setup().await;

        let result = engine
            .post_journal(PostJournalRequest {
                workplace_id,
                actor: "tester".to_string(),
                journal_date: Utc::now().date_naive(),
                description: "lonely line".to_string(),
                base_currency_code: "USD".to_string(),
                lines: vec![CandidateLine {
                    account_id: cash.id,
                    amount: dec!(100.00),
                    transaction_type: TransactionType::Debit,
                    currency_code: "USD".to_string(),
                    notes: None,
                    original_amount: None,
                    original_currency_code: None,
                    exchange_rate_id: None,
                }],
            })
            .await;

        assert!(matches!(result, Err(Error::Validation(_))));
    }
}
