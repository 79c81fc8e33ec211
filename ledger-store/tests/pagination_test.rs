mod support;

use std::collections::HashSet;
use std::time::Duration;

use ledger_core::{AccountType, TransactionType};
use ledger_store::{JournalStore, PostJournalRequest};

use support::{line, Ledger};

#[tokio::test]
async fn paging_through_every_page_visits_each_journal_exactly_once() {
    let ledger = Ledger::new().await;
    let cash = ledger.account(AccountType::Asset, rust_decimal::Decimal::ZERO).await;
    let revenue = ledger.account(AccountType::Revenue, rust_decimal::Decimal::ZERO).await;

    let mut posted_ids = HashSet::new();
    for i in 0..25 {
        let journal = ledger
            .engine
            .post_journal(PostJournalRequest {
                workplace_id: ledger.workplace_id,
                actor: "tester".to_string(),
                journal_date: chrono::Utc::now().date_naive(),
                description: format!("entry {i}"),
                base_currency_code: "USD".to_string(),
                lines: vec![
                    line(&cash, TransactionType::Debit, rust_decimal::Decimal::ONE),
                    line(&revenue, TransactionType::Credit, rust_decimal::Decimal::ONE),
                ],
            })
            .await
            .unwrap();
        posted_ids.insert(journal.id);
        // Ensure each journal gets a distinct created_at so the
        // (journal_date, created_at) sort key is never ambiguous.
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    assert_eq!(posted_ids.len(), 25);

    let mut seen = HashSet::new();
    let mut cursor = None;
    let mut pages = 0;
    loop {
        let page = ledger
            .journals
            .list_journals_by_workplace(ledger.workplace_id, 10, cursor.clone(), false)
            .await
            .unwrap();
        pages += 1;
        for journal in &page.items {
            assert!(seen.insert(journal.id), "journal {} visited twice", journal.id);
        }
        match page.next_cursor {
            Some(next) => cursor = Some(ledger_core::cursor::Cursor::decode(&next).unwrap()),
            None => break,
        }
        assert!(pages <= 10, "pagination did not terminate");
    }

    assert_eq!(seen, posted_ids);
    assert_eq!(pages, 3, "25 rows at page size 10 is 3 pages: 10 + 10 + 5");
}
