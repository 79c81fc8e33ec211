mod support;

use ledger_core::{AccountType, Error, TransactionType};
use ledger_store::{AccountStore, JournalStore, PostJournalRequest};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use support::{line, Ledger};

#[tokio::test]
async fn three_line_journal_distributes_deltas_across_every_affected_account() {
    let ledger = Ledger::new().await;
    let cash = ledger.account(AccountType::Asset, dec!(500)).await;
    let tax_expense = ledger.account(AccountType::Expense, Decimal::ZERO).await;
    let sales_revenue = ledger.account(AccountType::Revenue, Decimal::ZERO).await;
    let tax_payable = ledger.account(AccountType::Liability, Decimal::ZERO).await;

    let journal = ledger
        .engine
        .post_journal(PostJournalRequest {
            workplace_id: ledger.workplace_id,
            actor: "tester".to_string(),
            journal_date: chrono::Utc::now().date_naive(),
            description: "invoice with tax".to_string(),
            base_currency_code: "USD".to_string(),
            lines: vec![
                line(&cash, TransactionType::Debit, dec!(110)),
                line(&sales_revenue, TransactionType::Credit, dec!(100)),
                line(&tax_payable, TransactionType::Credit, dec!(10)),
            ],
        })
        .await
        .expect("balanced three-line journal posts");

    assert_eq!(journal.amount, dec!(110));

    assert_eq!(
        ledger.accounts.find_by_id(ledger.workplace_id, cash.id).await.unwrap().balance,
        dec!(610)
    );
    assert_eq!(
        ledger
            .accounts
            .find_by_id(ledger.workplace_id, sales_revenue.id)
            .await
            .unwrap()
            .balance,
        dec!(100)
    );
    assert_eq!(
        ledger
            .accounts
            .find_by_id(ledger.workplace_id, tax_payable.id)
            .await
            .unwrap()
            .balance,
        dec!(10)
    );
    assert_eq!(
        ledger
            .accounts
            .find_by_id(ledger.workplace_id, tax_expense.id)
            .await
            .unwrap()
            .balance,
        Decimal::ZERO
    );
}

#[tokio::test]
async fn imbalanced_journal_is_rejected_and_leaves_no_trace() {
    let ledger = Ledger::new().await;
    let cash = ledger.account(AccountType::Asset, Decimal::ZERO).await;
    let revenue = ledger.account(AccountType::Revenue, Decimal::ZERO).await;

    let result = ledger
        .engine
        .post_journal(PostJournalRequest {
            workplace_id: ledger.workplace_id,
            actor: "tester".to_string(),
            journal_date: chrono::Utc::now().date_naive(),
            description: "bad entry".to_string(),
            base_currency_code: "USD".to_string(),
            lines: vec![
                line(&cash, TransactionType::Debit, dec!(100)),
                line(&revenue, TransactionType::Credit, dec!(99)),
            ],
        })
        .await;

    assert!(matches!(result, Err(Error::Validation(_))));
    assert_eq!(
        ledger.accounts.find_by_id(ledger.workplace_id, cash.id).await.unwrap().balance,
        Decimal::ZERO
    );
}

#[tokio::test]
async fn concurrent_postings_against_the_same_account_serialize() {
    let ledger = std::sync::Arc::new(Ledger::new().await);
    let cash = ledger.account(AccountType::Asset, Decimal::ZERO).await;
    let revenue = ledger.account(AccountType::Revenue, Decimal::ZERO).await;

    let mut handles = Vec::new();
    for _ in 0..2 {
        let ledger = ledger.clone();
        let cash = cash.clone();
        let revenue = revenue.clone();
        handles.push(tokio::spawn(async move {
            ledger
                .engine
                .post_journal(PostJournalRequest {
                    workplace_id: ledger.workplace_id,
                    actor: "tester".to_string(),
                    journal_date: chrono::Utc::now().date_naive(),
                    description: "concurrent debit".to_string(),
                    base_currency_code: "USD".to_string(),
                    lines: vec![
                        line(&cash, TransactionType::Debit, dec!(50)),
                        line(&revenue, TransactionType::Credit, dec!(50)),
                    ],
                })
                .await
                .expect("each posting succeeds")
        }));
    }

    let mut running_balances = Vec::new();
    for handle in handles {
        let journal = handle.await.unwrap();
        let lines = ledger.journals.find_transactions_by_journal_id(journal.id).await.unwrap();
        let cash_line = lines.iter().find(|l| l.account_id == cash.id).unwrap();
        running_balances.push(cash_line.running_balance);
    }
    running_balances.sort();

    assert_eq!(running_balances, vec![dec!(50), dec!(100)]);
    assert_eq!(
        ledger.accounts.find_by_id(ledger.workplace_id, cash.id).await.unwrap().balance,
        dec!(100)
    );
}
