//! Shared scaffolding for `ledger-store`'s integration tests: an
//! in-memory `Ledger` bundling the posting engine, reversal protocol
//! and reporting aggregator behind the same construction every test
//! needs, plus builders for accounts and candidate lines so scenario
//! tests read like the spec's worked examples.

use std::sync::Arc;

use chrono::Utc;
use ledger_core::{Account, AccountType, CandidateLine, Currency, TransactionType};
use ledger_store::{
    InMemoryAccountStore, InMemoryJournalStore, InMemoryPostingStore, InMemoryReferenceStore,
    InMemoryReportingAggregator, PostingEngine, ReversalProtocol,
};
use rust_decimal::Decimal;
use uuid::Uuid;

pub struct Ledger {
    pub workplace_id: Uuid,
    pub accounts: Arc<InMemoryAccountStore>,
    pub journals: Arc<InMemoryJournalStore>,
    pub engine: PostingEngine,
    pub reversals: ReversalProtocol,
    pub reports: InMemoryReportingAggregator,
}

impl Ledger {
    pub async fn new() -> Self {
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

        let engine = PostingEngine::new(
            accounts.clone(),
            posting_store.clone(),
            reference.clone(),
            reference.clone(),
        );
        let reversals = ReversalProtocol::new(
            accounts.clone(),
            posting_store.clone(),
            reference.clone(),
            reference,
        );
        let reports = InMemoryReportingAggregator::new(accounts.clone(), journals.clone());

        Self {
            workplace_id,
            accounts,
            journals,
            engine,
            reversals,
            reports,
        }
    }

    /// Creates and saves an active USD account of the given type with
    /// the given opening balance (bypassing the posting engine — tests
    /// use this to set up non-zero starting balances directly).
    pub async fn account(&self, account_type: AccountType, opening_balance: Decimal) -> Account {
        use ledger_store::AccountStore;

        let now = Utc::now();
        let account = Account {
            id: Uuid::new_v4(),
            workplace_id: self.workplace_id,
            user_facing_id: None,
            name: format!("{account_type}-{}", Uuid::new_v4()),
            account_type,
            currency_code: "USD".to_string(),
            parent_account_id: None,
            description: None,
            active: true,
            balance: opening_balance,
            created_at: now,
            updated_at: now,
        };
        self.accounts.save(&account).await.unwrap();
        account
    }
}

pub fn line(account: &Account, transaction_type: TransactionType, amount: Decimal) -> CandidateLine {
    CandidateLine {
        account_id: account.id,
        amount,
        transaction_type,
        currency_code: account.currency_code.clone(),
        notes: None,
        original_amount: None,
        original_currency_code: None,
        exchange_rate_id: None,
    }
}
