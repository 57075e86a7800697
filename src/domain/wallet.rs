use serde::Serialize;
use uuid::Uuid;

use super::{
    Cents, LedgerError, Transaction, TransactionId, TransactionStatus, TransactionType,
    compute_balances, format_cents,
};

pub type WalletId = Uuid;

/// Both legs of a wallet-to-wallet transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferOutcome {
    /// Debit appended to the source wallet
    pub outgoing: Transaction,
    /// Credit appended to the target wallet
    pub incoming: Transaction,
}

/// A named wallet holding balances in several currencies, together with the
/// append-only ledger that produced them.
///
/// Invariant: for every currency, the balance equals the sum of the signed
/// transaction amounts in that currency, and is never negative.
#[derive(Debug, Clone)]
pub struct Wallet {
    /// Assigned by the repository on first save
    pub id: Option<WalletId>,
    name: String,
    /// Per-currency balance, in the order each currency was first used
    balances: Vec<(String, Cents)>,
    transactions: Vec<Transaction>,
}

impl Wallet {
    pub fn new(name: impl Into<String>) -> Result<Self, LedgerError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(LedgerError::InvalidName);
        }
        Ok(Self {
            id: None,
            name,
            balances: Vec::new(),
            transactions: Vec::new(),
        })
    }

    /// Rebuild a wallet from its persisted history, recomputing balances.
    pub fn restore(
        id: WalletId,
        name: impl Into<String>,
        transactions: Vec<Transaction>,
    ) -> Result<Self, LedgerError> {
        let mut wallet = Self::new(name)?;
        wallet.id = Some(id);
        wallet.balances = compute_balances(&transactions)?;
        wallet.transactions = transactions;
        Ok(wallet)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Balance for `currency`, zero if it has never been used.
    pub fn balance(&self, currency: &str) -> Cents {
        self.balances
            .iter()
            .find(|(code, _)| code == currency)
            .map(|(_, amount)| *amount)
            .unwrap_or(0)
    }

    pub fn balances(&self) -> impl Iterator<Item = (&str, Cents)> {
        self.balances
            .iter()
            .map(|(code, amount)| (code.as_str(), *amount))
    }

    pub fn top_up(&mut self, amount: Cents, currency: &str) -> Result<Transaction, LedgerError> {
        validate_amount(amount)?;
        self.balance(currency)
            .checked_add(amount)
            .ok_or_else(|| LedgerError::InvalidAmount("balance would overflow".to_string()))?;

        Ok(self.append(amount, currency, TransactionType::TopUp))
    }

    pub fn withdraw(&mut self, amount: Cents, currency: &str) -> Result<Transaction, LedgerError> {
        self.ensure_funds(amount, currency)?;
        Ok(self.append(-amount, currency, TransactionType::Payment))
    }

    /// Move `amount` of `currency` into `target`. Every check runs before either
    /// wallet is touched, so a failure leaves both unchanged.
    pub fn transfer(
        &mut self,
        amount: Cents,
        currency: &str,
        target: &mut Wallet,
    ) -> Result<TransferOutcome, LedgerError> {
        self.ensure_funds(amount, currency)?;
        target
            .balance(currency)
            .checked_add(amount)
            .ok_or_else(|| LedgerError::InvalidAmount("target balance would overflow".to_string()))?;

        let outgoing = self.append(-amount, currency, TransactionType::Transfer);
        let incoming = target.append(amount, currency, TransactionType::Transfer);
        Ok(TransferOutcome { outgoing, incoming })
    }

    /// One `"<CODE> <amount>"` line per currency, in first-use order.
    pub fn list_balance(&self) -> Vec<String> {
        self.balances
            .iter()
            .map(|(code, amount)| format!("{} {}", code, format_cents(*amount)))
            .collect()
    }

    pub fn get_total_transactions(&self) -> usize {
        self.transactions.len()
    }

    pub fn filter_transactions(&self, transaction_type: TransactionType) -> Vec<&Transaction> {
        self.transactions
            .iter()
            .filter(|tx| tx.transaction_type == transaction_type)
            .collect()
    }

    pub fn find_transaction(&self, id: TransactionId) -> Option<&Transaction> {
        self.transactions.iter().find(|tx| tx.id == id)
    }

    /// Advance a transaction's status. Balances are not affected.
    pub fn set_transaction_status(
        &mut self,
        id: TransactionId,
        status: TransactionStatus,
    ) -> Result<&Transaction, LedgerError> {
        let tx = self
            .transactions
            .iter_mut()
            .find(|tx| tx.id == id)
            .ok_or(LedgerError::TransactionNotFound(id))?;
        tx.transition(status)?;
        Ok(tx)
    }

    fn ensure_funds(&self, amount: Cents, currency: &str) -> Result<(), LedgerError> {
        validate_amount(amount)?;
        let balance = self.balance(currency);
        if balance < amount {
            return Err(LedgerError::InsufficientFunds {
                currency: currency.to_string(),
                balance,
                required: amount,
            });
        }
        Ok(())
    }

    // Callers validate first; this never fails.
    fn append(&mut self, signed_amount: Cents, currency: &str, kind: TransactionType) -> Transaction {
        match self.balances.iter_mut().find(|(code, _)| code == currency) {
            Some((_, balance)) => *balance += signed_amount,
            None => self.balances.push((currency.to_string(), signed_amount)),
        }

        let tx = Transaction::new(signed_amount, currency, kind);
        self.transactions.push(tx.clone());
        tx
    }
}

/// Ledger amounts must be strictly positive.
pub fn validate_amount(amount: Cents) -> Result<(), LedgerError> {
    if amount <= 0 {
        return Err(LedgerError::InvalidAmount(
            "Amount must be positive".to_string(),
        ));
    }
    Ok(())
}
