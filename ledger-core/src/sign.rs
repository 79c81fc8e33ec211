//! The sign rule and aggregate-amount function from §4.3. Pure and
//! storage-free so they can be unit-tested without a database and
//! shared verbatim between the posting engine and the reversal
//! protocol.

use rust_decimal::Decimal;

use crate::model::{AccountType, TransactionType};

/// Signed amount for a line of account type `account_type`, transaction
/// type `transaction_type`, and strictly-positive `amount`:
///
/// +amount when (Asset|Expense, Debit) or (Liability|Equity|Revenue, Credit)
/// -amount otherwise.
pub fn signed_amount(
    account_type: AccountType,
    transaction_type: TransactionType,
    amount: Decimal,
) -> Decimal {
    let debit_increases = matches!(account_type, AccountType::Asset | AccountType::Expense);
    let is_debit = matches!(transaction_type, TransactionType::Debit);
    if debit_increases == is_debit {
        amount
    } else {
        -amount
    }
}

/// Whether a line is a "money-moved" side for the purposes of the
/// aggregate journal amount: Debit on Asset/Expense, Credit on
/// Liability/Equity/Revenue.
fn is_money_moved_side(account_type: AccountType, transaction_type: TransactionType) -> bool {
    match account_type {
        AccountType::Asset | AccountType::Expense => {
            matches!(transaction_type, TransactionType::Debit)
        }
        AccountType::Liability | AccountType::Equity | AccountType::Revenue => {
            matches!(transaction_type, TransactionType::Credit)
        }
    }
}

/// The aggregate amount recorded on a journal header: the sum of the
/// "money-moved" side's line amounts. Invariant under the sign rule and
/// equal to either side's total for any balanced journal.
pub fn aggregate_amount<'a, I>(lines: I) -> Decimal
where
    I: IntoIterator<Item = (AccountType, TransactionType, Decimal)>,
{
    lines
        .into_iter()
        .filter(|&(account_type, transaction_type, _)| {
            is_money_moved_side(account_type, transaction_type)
        })
        .map(|(_, _, amount)| amount)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn debit_increases_asset_and_expense() {
        assert_eq!(
            signed_amount(AccountType::Asset, TransactionType::Debit, dec!(100)),
            dec!(100)
        );
        assert_eq!(
            signed_amount(AccountType::Expense, TransactionType::Debit, dec!(10)),
            dec!(10)
        );
    }

    #[test]
    fn credit_decreases_asset_and_expense() {
        assert_eq!(
            signed_amount(AccountType::Asset, TransactionType::Credit, dec!(100)),
            dec!(-100)
        );
    }

    #[test]
    fn credit_increases_liability_equity_revenue() {
        for t in [AccountType::Liability, AccountType::Equity, AccountType::Revenue] {
            assert_eq!(signed_amount(t, TransactionType::Credit, dec!(10)), dec!(10));
            assert_eq!(signed_amount(t, TransactionType::Debit, dec!(10)), dec!(-10));
        }
    }

    #[test]
    fn aggregate_amount_matches_either_side_of_a_balanced_journal() {
        let lines = vec![
            (AccountType::Asset, TransactionType::Debit, dec!(110)),
            (AccountType::Revenue, TransactionType::Credit, dec!(100)),
            (AccountType::Liability, TransactionType::Credit, dec!(10)),
        ];
        assert_eq!(aggregate_amount(lines), dec!(110));
    }
}
