//! Reversal protocol (C4): posts the sign-flipped inverse of an
//! existing journal and links the two together, all inside one
//! database transaction (§4.4).

use std::sync::Arc;

use chrono::Utc;
use ledger_core::{CandidateLine, Error, Journal, JournalStatus, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::accounts::AccountStore;
use crate::cancellation::run_cancellable;
use crate::reference::{CurrencyFinder, ExchangeRateFinder};

use super::engine::PostingEngine;
use super::txn::PostingStore;

/// Reverses a posted journal by building and atomically posting its
/// sign-flipped inverse, then linking both journals together.
pub struct ReversalProtocol {
    accounts: Arc<dyn AccountStore>,
    posting_store: Arc<dyn PostingStore>,
    currencies: Arc<dyn CurrencyFinder>,
    exchange_rates: Arc<dyn ExchangeRateFinder>,
}

impl ReversalProtocol {
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

    /// §4.4: load the original journal under lock, validate it can be
    /// reversed, post its sign-flipped inverse and update both
    /// journals' status/links — all inside the one transaction opened
    /// here.
    #[instrument(skip(self, reason), fields(%workplace_id, %journal_id))]
    pub async fn reverse_journal(
        &self,
        workplace_id: Uuid,
        journal_id: Uuid,
        actor: String,
        reason: Option<String>,
    ) -> Result<Journal> {
        self.reverse_journal_cancellable(workplace_id, journal_id, actor, reason, None)
            .await
    }

    /// As `reverse_journal`, but aborts (rolling back the open
    /// transaction by dropping it) if `cancellation` fires before the
    /// reversal commits.
    pub async fn reverse_journal_cancellable(
        &self,
        workplace_id: Uuid,
        journal_id: Uuid,
        actor: String,
        reason: Option<String>,
        cancellation: Option<&CancellationToken>,
    ) -> Result<Journal> {
        let at = Utc::now();
        let engine = PostingEngine::new(
            self.accounts.clone(),
            self.posting_store.clone(),
            self.currencies.clone(),
            self.exchange_rates.clone(),
        );

        let reversing_journal = run_cancellable(cancellation, async {
            let mut tx = self.posting_store.begin().await?;

            let original = tx.find_journal_for_update(workplace_id, journal_id).await?;
            if original.status != JournalStatus::Posted {
                return Err(Error::Validation(format!(
                    "journal {journal_id} is not posted (status: {})",
                    original.status
                )));
            }
            if original.original_journal_id.is_some() {
                return Err(Error::Validation(format!(
                    "journal {journal_id} is itself a reversal and cannot be reversed"
                )));
            }

            let original_lines = tx.find_lines_for_update(journal_id).await?;

            let description = match &reason {
                Some(override_description) => format!("REVERSAL: {override_description}"),
                None => format!("REVERSAL: {}", original.description),
            };

            let reversing_lines: Vec<CandidateLine> = original_lines
                .iter()
                .map(|line| CandidateLine {
                    account_id: line.account_id,
                    amount: line.amount,
                    transaction_type: line.transaction_type.flipped(),
                    currency_code: line.currency_code.clone(),
                    notes: line.notes.clone(),
                    original_amount: line.original_amount,
                    original_currency_code: line.original_currency_code.clone(),
                    exchange_rate_id: line.exchange_rate_id,
                })
                .collect();

            let mut prepared = engine
                .validate_and_prepare(
                    super::engine::PostJournalRequest {
                        workplace_id,
                        actor: actor.clone(),
                        journal_date: at.date_naive(),
                        description,
                        base_currency_code: original.base_currency_code.clone(),
                        lines: reversing_lines,
                    },
                    at,
                )
                .await?;
            prepared.journal.original_journal_id = Some(original.id);

            let reversing_journal = PostingEngine::write_prepared(&mut *tx, &mut prepared, at).await?;

            tx.update_status_and_links(
                original.id,
                JournalStatus::Reversed,
                Some(reversing_journal.id),
                None,
                &actor,
                at,
            )
            .await?;

            tx.commit().await?;
            Ok(reversing_journal)
        })
        .await?;

        info!(
            original_journal_id = %journal_id,
            reversing_journal_id = %reversing_journal.id,
            "journal reversed"
        );

        Ok(reversing_journal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::InMemoryAccountStore;
    use crate::journals::{InMemoryJournalStore, JournalStore};
    use crate::posting::{InMemoryPostingStore, PostJournalRequest};
    use crate::reference::InMemoryReferenceStore;
    use ledger_core::{Account, AccountType, Currency, TransactionType};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn account(workplace_id: Uuid, account_type: AccountType, currency: &str) -> Account {
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
            balance: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn reversing_a_posted_journal_restores_balances_and_links_both_journals() {
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

        let cash = account(workplace_id, AccountType::Asset, "USD");
        let revenue = account(workplace_id, AccountType::Revenue, "USD");
        accounts.save(&cash).await.unwrap();
        accounts.save(&revenue).await.unwrap();

        let engine = PostingEngine::new(
            accounts.clone(),
            posting_store.clone(),
            reference.clone(),
            reference.clone(),
        );
        let original = engine
            .post_journal(PostJournalRequest {
                workplace_id,
                actor: "tester".to_string(),
                journal_date: Utc::now().date_naive(),
                description: "cash sale".to_string(),
                base_currency_code: "USD".to_string(),
                lines: vec![
                    CandidateLine {
                        account_id: cash.id,
                        amount: dec!(50.00),
                        transaction_type: TransactionType::Debit,
                        currency_code: "USD".to_string(),
                        notes: None,
                        original_amount: None,
                        original_currency_code: None,
                        exchange_rate_id: None,
                    },
                    CandidateLine {
                        account_id: revenue.id,
                        amount: dec!(50.00),
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
            .unwrap();

        let protocol = ReversalProtocol::new(accounts.clone(), posting_store, reference.clone(), reference);
        let reversal = protocol
            .reverse_journal(workplace_id, original.id, "tester".to_string(), Some("booked in error".to_string()))
            .await
            .expect("reversal succeeds");

        assert_eq!(reversal.original_journal_id, Some(original.id));

        let cash_after = accounts.find_by_id(workplace_id, cash.id).await.unwrap();
        let revenue_after = accounts.find_by_id(workplace_id, revenue.id).await.unwrap();
        assert_eq!(cash_after.balance, Decimal::ZERO);
        assert_eq!(revenue_after.balance, Decimal::ZERO);

        let original_after = journals.find_journal_by_id(workplace_id, original.id).await.unwrap();
        assert_eq!(original_after.status, JournalStatus::Reversed);
        assert_eq!(original_after.reversing_journal_id, Some(reversal.id));
    }

    #[tokio::test]
    async fn reversing_an_already_reversed_journal_is_rejected() {
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

        let cash = account(workplace_id, AccountType::Asset, "USD");
        let revenue = account(workplace_id, AccountType::Revenue, "USD");
        accounts.save(&cash).await.unwrap();
        accounts.save(&revenue).await.unwrap();

        let engine = PostingEngine::new(
            accounts.clone(),
            posting_store.clone(),
            reference.clone(),
            reference.clone(),
        );
        let original = engine
            .post_journal(PostJournalRequest {
                workplace_id,
                actor: "tester".to_string(),
                journal_date: Utc::now().date_naive(),
                description: "cash sale".to_string(),
                base_currency_code: "USD".to_string(),
                lines: vec![
                    CandidateLine {
                        account_id: cash.id,
                        amount: dec!(10.00),
                        transaction_type: TransactionType::Debit,
                        currency_code: "USD".to_string(),
                        notes: None,
                        original_amount: None,
                        original_currency_code: None,
                        exchange_rate_id: None,
                    },
                    CandidateLine {
                        account_id: revenue.id,
                        amount: dec!(10.00),
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
            .unwrap();

        let protocol = ReversalProtocol::new(accounts, posting_store, reference.clone(), reference);
        protocol
            .reverse_journal(workplace_id, original.id, "tester".to_string(), None)
            .await
            .unwrap();

        let result = protocol
            .reverse_journal(workplace_id, original.id, "tester".to_string(), None)
            .await;
        assert!(matches!(result, Err(Error::Validation(_))));
    }
}
