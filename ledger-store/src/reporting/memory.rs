use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use ledger_core::{AccountType, Result, TransactionType};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::accounts::InMemoryAccountStore;
use crate::journals::InMemoryJournalStore;

use super::{
    ledger_epoch, signed_net, BalanceSheet, BalanceSheetLine, ProfitAndLoss, ProfitAndLossLine,
    ReportingAggregator, TrialBalance, TrialBalanceRow,
};

/// In-memory `ReportingAggregator`, scanning every eligible transaction
/// line in process rather than issuing one aggregate SQL query per
/// report — acceptable here since the double never holds more than a
/// test's worth of journals. `SqlxReportingAggregator` is the
/// production counterpart that pushes the grouping into Postgres.
pub struct InMemoryReportingAggregator {
    accounts: Arc<InMemoryAccountStore>,
    journals: Arc<InMemoryJournalStore>,
}

impl InMemoryReportingAggregator {
    pub fn new(accounts: Arc<InMemoryAccountStore>, journals: Arc<InMemoryJournalStore>) -> Self {
        Self { accounts, journals }
    }

    /// Per-account (total_debit, total_credit) over eligible lines dated
    /// in `[on_or_after, on_or_before]`, restricted to `account_types` if
    /// non-empty.
    fn debit_credit_totals(
        &self,
        workplace_id: Uuid,
        on_or_after: Option<NaiveDate>,
        on_or_before: NaiveDate,
        account_types: &[AccountType],
    ) -> HashMap<Uuid, (Decimal, Decimal)> {
        let accounts: HashMap<Uuid, AccountType> = self
            .accounts
            .all_accounts(workplace_id)
            .into_iter()
            .map(|a| (a.id, a.account_type))
            .collect();

        let mut totals: HashMap<Uuid, (Decimal, Decimal)> = HashMap::new();
        for (account_id, transaction_type, amount) in
            self.journals.eligible_lines(workplace_id, on_or_after, on_or_before)
        {
            let Some(&account_type) = accounts.get(&account_id) else {
                continue;
            };
            if !account_types.is_empty() && !account_types.contains(&account_type) {
                continue;
            }
            let entry = totals.entry(account_id).or_insert((Decimal::ZERO, Decimal::ZERO));
            match transaction_type {
                TransactionType::Debit => entry.0 += amount,
                TransactionType::Credit => entry.1 += amount,
            }
        }
        totals
    }
}

#[async_trait]
impl ReportingAggregator for InMemoryReportingAggregator {
    async fn trial_balance(&self, workplace_id: Uuid, as_of: NaiveDate) -> Result<TrialBalance> {
        let totals = self.debit_credit_totals(workplace_id, None, as_of, &[]);
        let accounts_by_id: HashMap<Uuid, _> = self
            .accounts
            .all_accounts(workplace_id)
            .into_iter()
            .map(|a| (a.id, a))
            .collect();

        let mut rows: Vec<TrialBalanceRow> = totals
            .into_iter()
            .filter_map(|(account_id, (debit, credit))| {
                let account = accounts_by_id.get(&account_id)?;
                Some(TrialBalanceRow {
                    account_id,
                    account_name: account.name.clone(),
                    account_type: account.account_type,
                    total_debit: debit,
                    total_credit: credit,
                })
            })
            .collect();
        rows.sort_by(|a, b| a.account_name.cmp(&b.account_name));

        let total_debit = rows.iter().map(|r| r.total_debit).sum();
        let total_credit = rows.iter().map(|r| r.total_credit).sum();

        Ok(TrialBalance {
            as_of,
            rows,
            total_debit,
            total_credit,
        })
    }

    async fn profit_and_loss(&self, workplace_id: Uuid, from: NaiveDate, to: NaiveDate) -> Result<ProfitAndLoss> {
        let totals = self.debit_credit_totals(
            workplace_id,
            Some(from),
            to,
            &[AccountType::Revenue, AccountType::Expense],
        );
        let accounts_by_id: HashMap<Uuid, _> = self
            .accounts
            .all_accounts(workplace_id)
            .into_iter()
            .map(|a| (a.id, a))
            .collect();

        let mut revenue = Vec::new();
        let mut expense = Vec::new();
        for (account_id, (debit, credit)) in totals {
            let Some(account) = accounts_by_id.get(&account_id) else {
                continue;
            };
            let line = ProfitAndLossLine {
                account_id,
                account_name: account.name.clone(),
                net: signed_net(account.account_type, debit, credit),
            };
            match account.account_type {
                AccountType::Revenue => revenue.push(line),
                AccountType::Expense => expense.push(line),
                _ => {}
            }
        }
        revenue.sort_by(|a, b| a.account_name.cmp(&b.account_name));
        expense.sort_by(|a, b| a.account_name.cmp(&b.account_name));

        let total_revenue: Decimal = revenue.iter().map(|r| r.net).sum();
        let total_expense: Decimal = expense.iter().map(|r| r.net).sum();

        Ok(ProfitAndLoss {
            from,
            to,
            revenue,
            expense,
            total_revenue,
            total_expense,
            net_profit: total_revenue - total_expense,
        })
    }

    async fn balance_sheet(&self, workplace_id: Uuid, as_of: NaiveDate) -> Result<BalanceSheet> {
        let totals = self.debit_credit_totals(
            workplace_id,
            None,
            as_of,
            &[AccountType::Asset, AccountType::Liability, AccountType::Equity],
        );
        let accounts_by_id: HashMap<Uuid, _> = self
            .accounts
            .all_accounts(workplace_id)
            .into_iter()
            .map(|a| (a.id, a))
            .collect();

        let mut assets = Vec::new();
        let mut liabilities = Vec::new();
        let mut equity = Vec::new();
        for (account_id, (debit, credit)) in totals {
            let Some(account) = accounts_by_id.get(&account_id) else {
                continue;
            };
            let line = BalanceSheetLine {
                account_id,
                account_name: account.name.clone(),
                net: signed_net(account.account_type, debit, credit),
            };
            match account.account_type {
                AccountType::Asset => assets.push(line),
                AccountType::Liability => liabilities.push(line),
                AccountType::Equity => equity.push(line),
                _ => {}
            }
        }
        assets.sort_by(|a, b| a.account_name.cmp(&b.account_name));
        liabilities.sort_by(|a, b| a.account_name.cmp(&b.account_name));
        equity.sort_by(|a, b| a.account_name.cmp(&b.account_name));

        let total_assets: Decimal = assets.iter().map(|r| r.net).sum();
        let total_liabilities: Decimal = liabilities.iter().map(|r| r.net).sum();
        let total_equity: Decimal = equity.iter().map(|r| r.net).sum();

        // Retained earnings fold in cumulative P&L so the balance-sheet
        // identity holds without a separate "from the beginning of time"
        // sentinel: §4.5 scans every eligible journal up to `as_of`.
        let pl = self
            .profit_and_loss(workplace_id, ledger_epoch(), as_of)
            .await?;

        Ok(BalanceSheet {
            as_of,
            assets,
            liabilities,
            equity,
            total_assets,
            total_liabilities,
            total_equity,
            retained_earnings: pl.net_profit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::AccountStore;
    use crate::posting::{InMemoryPostingStore, PostJournalRequest, PostingEngine};
    use crate::reference::InMemoryReferenceStore;
    use chrono::Utc;
    use ledger_core::{Account, CandidateLine, Currency, TransactionType};
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
    async fn trial_balance_debits_equal_credits_on_a_consistent_ledger() {
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

        let engine = PostingEngine::new(accounts.clone(), posting_store, reference.clone(), reference);
        engine
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
            .unwrap();

        let aggregator = InMemoryReportingAggregator::new(accounts, journals);
        let tb = aggregator
            .trial_balance(workplace_id, Utc::now().date_naive())
            .await
            .unwrap();

        assert_eq!(tb.total_debit, tb.total_credit);
        assert_eq!(tb.total_debit, dec!(100.00));
        assert_eq!(tb.rows.len(), 2);
    }
}
