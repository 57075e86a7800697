use thiserror::Error;

use super::{Cents, Transaction, TransactionId, TransactionStatus, format_cents};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error(
        "Insufficient funds in {currency}: balance {}, required {}",
        format_cents(*balance),
        format_cents(*required)
    )]
    InsufficientFunds {
        currency: String,
        balance: Cents,
        required: Cents,
    },

    #[error("Wallet name must not be empty")]
    InvalidName,

    #[error("Transaction not found: {0}")]
    TransactionNotFound(TransactionId),

    #[error("Transaction {id} cannot move from {from} to {to}")]
    InvalidStatusTransition {
        id: TransactionId,
        from: TransactionStatus,
        to: TransactionStatus,
    },

    #[error("Transaction history is inconsistent: {0}")]
    CorruptHistory(String),
}

/// Replay a transaction history into per-currency balances.
/// Currencies appear in the order they were first seen. Fails if any prefix of
/// the history would leave a balance negative or overflow.
pub fn compute_balances(transactions: &[Transaction]) -> Result<Vec<(String, Cents)>, LedgerError> {
    let mut balances: Vec<(String, Cents)> = Vec::new();

    for tx in transactions {
        let index = match balances.iter().position(|(code, _)| *code == tx.currency) {
            Some(index) => index,
            None => {
                balances.push((tx.currency.clone(), 0));
                balances.len() - 1
            }
        };

        let entry = &mut balances[index].1;
        let next = entry.checked_add(tx.amount).ok_or_else(|| {
            LedgerError::CorruptHistory(format!("balance overflow in {}", tx.currency))
        })?;
        if next < 0 {
            return Err(LedgerError::CorruptHistory(format!(
                "transaction {} drives {} balance negative",
                tx.id, tx.currency
            )));
        }
        *entry = next;
    }

    Ok(balances)
}

/// Sum of signed amounts for one currency.
pub fn sum_for_currency(transactions: &[Transaction], currency: &str) -> Cents {
    transactions
        .iter()
        .filter(|tx| tx.currency == currency)
        .map(|tx| tx.amount)
        .sum()
}
