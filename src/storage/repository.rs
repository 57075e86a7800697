use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Transaction, TransferOutcome, Wallet, WalletId};

use super::{BatchOutcome, BatchPersistence, Item, KeyValueStore, WriteOperation};

/// Stored shape of a wallet record.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WalletRecord {
    id: String,
    name: String,
}

/// Stored shape of a ledger entry. The sequence number orders a wallet's history.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TransactionRecord {
    wallet_id: String,
    sequence: usize,
    #[serde(flatten)]
    transaction: Transaction,
}

fn transaction_prefix(wallet_id: WalletId) -> String {
    format!("{}#", wallet_id)
}

fn transaction_key(wallet_id: WalletId, sequence: usize) -> String {
    format!("{}#{:010}", wallet_id, sequence)
}

/// Repository for persisting and loading wallets and their ledgers.
pub struct WalletRepository {
    wallets: Arc<dyn KeyValueStore>,
    transactions: Arc<dyn KeyValueStore>,
    batch: BatchPersistence,
}

impl WalletRepository {
    pub fn new(
        wallets: Arc<dyn KeyValueStore>,
        transactions: Arc<dyn KeyValueStore>,
        batch: BatchPersistence,
    ) -> Self {
        Self {
            wallets,
            transactions,
            batch,
        }
    }

    // ========================
    // Wallet operations
    // ========================

    /// Save a new wallet, assigning its id. Any transactions already in the
    /// wallet are written first; the wallet record goes last, so a failed save
    /// leaves no wallet behind and `wallet.id` untouched.
    pub async fn save(&self, wallet: &mut Wallet) -> Result<WalletId> {
        let id = Uuid::new_v4();

        if !wallet.transactions().is_empty() {
            let items = wallet
                .transactions()
                .iter()
                .enumerate()
                .map(|(sequence, tx)| Self::transaction_item(id, sequence, tx))
                .collect::<Result<Vec<_>>>()?;

            let outcome = self
                .batch
                .batch_write(self.transactions.as_ref(), items, WriteOperation::Put)
                .await;
            if !outcome.is_complete() {
                return Err(anyhow!(
                    "Failed to save {} transaction group(s) for wallet {}",
                    outcome.abandoned().count(),
                    id
                ));
            }
        }

        self.wallets
            .put(Self::wallet_item(id, wallet)?)
            .await
            .context("Failed to save wallet")?;
        wallet.id = Some(id);

        tracing::debug!(wallet_id = %id, name = wallet.name(), "Saved wallet");
        Ok(id)
    }

    /// Rewrite the wallet record.
    pub async fn update(&self, wallet: &Wallet) -> Result<()> {
        let id = Self::require_id(wallet)?;
        self.wallets
            .put(Self::wallet_item(id, wallet)?)
            .await
            .context("Failed to update wallet")?;
        Ok(())
    }

    /// Load a wallet and its full ledger.
    pub async fn find(&self, id: WalletId) -> Result<Option<Wallet>> {
        let item = self
            .wallets
            .get(&id.to_string())
            .await
            .context("Failed to fetch wallet")?;

        match item {
            Some(item) => Ok(Some(self.load_wallet(item).await?)),
            None => Ok(None),
        }
    }

    /// List all wallets, ordered by id.
    pub async fn list_wallets(&self) -> Result<Vec<Wallet>> {
        let items = self
            .wallets
            .scan("")
            .await
            .context("Failed to list wallets")?;

        let mut wallets = Vec::with_capacity(items.len());
        for item in items {
            wallets.push(self.load_wallet(item).await?);
        }
        Ok(wallets)
    }

    /// Load many wallets in groups. Wallets whose group could not be read are
    /// left out; the outcome says which groups were abandoned.
    pub async fn find_many(&self, ids: &[WalletId]) -> Result<BatchOutcome<Vec<Wallet>>> {
        let keys: Vec<String> = ids.iter().map(ToString::to_string).collect();
        let outcome = self.batch.batch_get(self.wallets.as_ref(), &keys).await;

        let mut wallets = Vec::with_capacity(outcome.value.len());
        for item in outcome.value {
            wallets.push(self.load_wallet(item).await?);
        }
        Ok(BatchOutcome {
            value: wallets,
            groups: outcome.groups,
        })
    }

    /// Delete wallet records and their ledgers in groups.
    ///
    /// Records go first. A ledger is only removed once its wallet record is
    /// gone, so an abandoned group never leaves a live wallet without history.
    pub async fn delete_many(&self, ids: &[WalletId]) -> Result<BatchOutcome<()>> {
        let records = ids
            .iter()
            .map(|id| Item::new(id.to_string(), serde_json::Value::Null))
            .collect();
        let outcome = self
            .batch
            .batch_write(self.wallets.as_ref(), records, WriteOperation::Delete)
            .await;

        let mut deleted = Vec::with_capacity(ids.len());
        let mut offset = 0;
        for group in &outcome.groups {
            if group.is_done() {
                deleted.extend_from_slice(&ids[offset..offset + group.len]);
            }
            offset += group.len;
        }

        let mut transaction_items = Vec::new();
        for id in &deleted {
            let history = self
                .transactions
                .scan(&transaction_prefix(*id))
                .await
                .context("Failed to list transactions")?;
            transaction_items.extend(history);
        }

        let ledger = self
            .batch
            .batch_write(
                self.transactions.as_ref(),
                transaction_items,
                WriteOperation::Delete,
            )
            .await;
        if !ledger.is_complete() {
            tracing::warn!(
                abandoned = ledger.abandoned().count(),
                "Some ledger groups of deleted wallets were left behind"
            );
        }

        Ok(outcome)
    }

    // ========================
    // Transaction operations
    // ========================

    /// Write (or rewrite) one ledger entry. `tx` must belong to `wallet`.
    pub async fn save_transaction(&self, wallet: &Wallet, tx: &Transaction) -> Result<()> {
        let id = Self::require_id(wallet)?;
        let item = Self::transaction_item(id, Self::sequence_of(wallet, tx)?, tx)?;
        self.transactions
            .put(item)
            .await
            .context("Failed to save transaction")?;
        Ok(())
    }

    /// Write both legs of a transfer in a single request, so either both are
    /// stored or neither is.
    pub async fn save_transfer(
        &self,
        source: &Wallet,
        target: &Wallet,
        outcome: &TransferOutcome,
    ) -> Result<()> {
        let source_id = Self::require_id(source)?;
        let target_id = Self::require_id(target)?;

        let items = vec![
            Self::transaction_item(
                source_id,
                Self::sequence_of(source, &outcome.outgoing)?,
                &outcome.outgoing,
            )?,
            Self::transaction_item(
                target_id,
                Self::sequence_of(target, &outcome.incoming)?,
                &outcome.incoming,
            )?,
        ];

        self.transactions
            .multi_put(items)
            .await
            .context("Failed to save transfer")?;
        Ok(())
    }

    /// Load the ledger of one wallet in order.
    pub async fn list_transactions(&self, wallet_id: WalletId) -> Result<Vec<Transaction>> {
        let items = self
            .transactions
            .scan(&transaction_prefix(wallet_id))
            .await
            .context("Failed to list transactions")?;

        items
            .into_iter()
            .map(|item| {
                let record: TransactionRecord = serde_json::from_value(item.value)
                    .with_context(|| format!("Invalid transaction record {}", item.key))?;
                Ok(record.transaction)
            })
            .collect()
    }

    async fn load_wallet(&self, item: Item) -> Result<Wallet> {
        let record: WalletRecord = serde_json::from_value(item.value)
            .with_context(|| format!("Invalid wallet record {}", item.key))?;
        let id = Uuid::parse_str(&record.id).context("Invalid wallet ID")?;
        let transactions = self.list_transactions(id).await?;

        Wallet::restore(id, record.name, transactions)
            .with_context(|| format!("Failed to restore wallet {}", id))
    }

    fn wallet_item(id: WalletId, wallet: &Wallet) -> Result<Item> {
        let record = WalletRecord {
            id: id.to_string(),
            name: wallet.name().to_string(),
        };
        Ok(Item::new(id.to_string(), serde_json::to_value(record)?))
    }

    fn transaction_item(wallet_id: WalletId, sequence: usize, tx: &Transaction) -> Result<Item> {
        let record = TransactionRecord {
            wallet_id: wallet_id.to_string(),
            sequence,
            transaction: tx.clone(),
        };
        Ok(Item::new(
            transaction_key(wallet_id, sequence),
            serde_json::to_value(record)?,
        ))
    }

    fn require_id(wallet: &Wallet) -> Result<WalletId> {
        wallet
            .id
            .ok_or_else(|| anyhow!("Wallet '{}' has not been saved", wallet.name()))
    }

    fn sequence_of(wallet: &Wallet, tx: &Transaction) -> Result<usize> {
        wallet
            .transactions()
            .iter()
            .position(|t| t.id == tx.id)
            .ok_or_else(|| anyhow!("Transaction {} is not in wallet '{}'", tx.id, wallet.name()))
    }
}
