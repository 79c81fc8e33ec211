mod support;

use ledger_core::{AccountType, TransactionType};
use ledger_store::{PostJournalRequest, ReportingAggregator};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use support::{line, Ledger};

#[tokio::test]
async fn trial_balance_totals_match_on_a_consistent_ledger() {
    let ledger = Ledger::new().await;
    let cash = ledger.account(AccountType::Asset, Decimal::ZERO).await;
    let revenue = ledger.account(AccountType::Revenue, Decimal::ZERO).await;
    let expense = ledger.account(AccountType::Expense, Decimal::ZERO).await;

    let today = chrono::Utc::now().date_naive();
    ledger
        .engine
        .post_journal(PostJournalRequest {
            workplace_id: ledger.workplace_id,
            actor: "tester".to_string(),
            journal_date: today,
            description: "cash sale".to_string(),
            base_currency_code: "USD".to_string(),
            lines: vec![
                line(&cash, TransactionType::Debit, dec!(200)),
                line(&revenue, TransactionType::Credit, dec!(200)),
            ],
        })
        .await
        .unwrap();
    ledger
        .engine
        .post_journal(PostJournalRequest {
            workplace_id: ledger.workplace_id,
            actor: "tester".to_string(),
            journal_date: today,
            description: "rent".to_string(),
            base_currency_code: "USD".to_string(),
            lines: vec![
                line(&expense, TransactionType::Debit, dec!(30)),
                line(&cash, TransactionType::Credit, dec!(30)),
            ],
        })
        .await
        .unwrap();

    let tb = ledger.reports.trial_balance(ledger.workplace_id, today).await.unwrap();
    assert_eq!(tb.total_debit, tb.total_credit);
    assert_eq!(tb.rows.len(), 3);
}

#[tokio::test]
async fn profit_and_loss_nets_revenue_against_expense() {
    let ledger = Ledger::new().await;
    let cash = ledger.account(AccountType::Asset, Decimal::ZERO).await;
    let revenue = ledger.account(AccountType::Revenue, Decimal::ZERO).await;
    let expense = ledger.account(AccountType::Expense, Decimal::ZERO).await;

    let today = chrono::Utc::now().date_naive();
    ledger
        .engine
        .post_journal(PostJournalRequest {
            workplace_id: ledger.workplace_id,
            actor: "tester".to_string(),
            journal_date: today,
            description: "cash sale".to_string(),
            base_currency_code: "USD".to_string(),
            lines: vec![
                line(&cash, TransactionType::Debit, dec!(200)),
                line(&revenue, TransactionType::Credit, dec!(200)),
            ],
        })
        .await
        .unwrap();
    ledger
        .engine
        .post_journal(PostJournalRequest {
            workplace_id: ledger.workplace_id,
            actor: "tester".to_string(),
            journal_date: today,
            description: "rent".to_string(),
            base_currency_code: "USD".to_string(),
            lines: vec![
                line(&expense, TransactionType::Debit, dec!(30)),
                line(&cash, TransactionType::Credit, dec!(30)),
            ],
        })
        .await
        .unwrap();

    let pl = ledger
        .reports
        .profit_and_loss(ledger.workplace_id, today, today)
        .await
        .unwrap();
    assert_eq!(pl.total_revenue, dec!(200));
    assert_eq!(pl.total_expense, dec!(30));
    assert_eq!(pl.net_profit, dec!(170));
}

#[tokio::test]
async fn reversed_journals_are_excluded_from_every_report() {
    let ledger = Ledger::new().await;
    let cash = ledger.account(AccountType::Asset, Decimal::ZERO).await;
    let revenue = ledger.account(AccountType::Revenue, Decimal::ZERO).await;

    let today = chrono::Utc::now().date_naive();
    let journal = ledger
        .engine
        .post_journal(PostJournalRequest {
            workplace_id: ledger.workplace_id,
            actor: "tester".to_string(),
            journal_date: today,
            description: "cash sale".to_string(),
            base_currency_code: "USD".to_string(),
            lines: vec![
                line(&cash, TransactionType::Debit, dec!(50)),
                line(&revenue, TransactionType::Credit, dec!(50)),
            ],
        })
        .await
        .unwrap();

    ledger
        .reversals
        .reverse_journal(ledger.workplace_id, journal.id, "tester".to_string(), None)
        .await
        .unwrap();

    let tb = ledger.reports.trial_balance(ledger.workplace_id, today).await.unwrap();
    assert_eq!(tb.total_debit, Decimal::ZERO);
    assert_eq!(tb.total_credit, Decimal::ZERO);
}
