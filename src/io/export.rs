use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;

use crate::application::WalletService;
use crate::domain::{Transaction, Wallet, WalletId};

/// Portable view of one wallet: identity, formatted balances and full ledger.
#[derive(Debug, Clone, Serialize)]
pub struct WalletSnapshot {
    pub id: Option<WalletId>,
    pub name: String,
    pub balances: Vec<String>,
    pub transactions: Vec<Transaction>,
}

impl From<&Wallet> for WalletSnapshot {
    fn from(wallet: &Wallet) -> Self {
        Self {
            id: wallet.id,
            name: wallet.name().to_string(),
            balances: wallet.list_balance(),
            transactions: wallet.transactions().to_vec(),
        }
    }
}

/// Snapshot of every wallet for a full JSON export
#[derive(Debug, Clone, Serialize)]
pub struct DatabaseSnapshot {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub wallets: Vec<WalletSnapshot>,
}

/// Exporter for converting ledger data to various formats
pub struct Exporter<'a> {
    service: &'a WalletService,
}

impl<'a> Exporter<'a> {
    pub fn new(service: &'a WalletService) -> Self {
        Self { service }
    }

    /// Export one wallet's ledger to CSV format
    pub async fn export_transactions_csv<W: Write>(
        &self,
        wallet_id: WalletId,
        writer: W,
    ) -> Result<usize> {
        let wallet = self.service.get_wallet(wallet_id).await?;
        write_transactions_csv(wallet.transactions(), writer)
    }

    /// Export every wallet as a JSON snapshot
    pub async fn export_full_json<W: Write>(&self, mut writer: W) -> Result<DatabaseSnapshot> {
        let wallets = self.service.list_wallets().await?;

        let snapshot = DatabaseSnapshot {
            version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: Utc::now(),
            wallets: wallets.iter().map(WalletSnapshot::from).collect(),
        };

        let json = serde_json::to_string_pretty(&snapshot)?;
        writer.write_all(json.as_bytes())?;
        writer.flush()?;

        Ok(snapshot)
    }
}

/// Write ledger entries as CSV, one row per transaction. Amounts are in cents.
pub fn write_transactions_csv<W: Write>(transactions: &[Transaction], writer: W) -> Result<usize> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    csv_writer.write_record([
        "id",
        "created_at",
        "type",
        "status",
        "currency",
        "amount_cents",
    ])?;

    for tx in transactions {
        csv_writer.write_record([
            tx.id.to_string(),
            tx.created_at.to_rfc3339(),
            tx.transaction_type.as_str().to_string(),
            tx.status.as_str().to_string(),
            tx.currency.clone(),
            tx.amount.to_string(),
        ])?;
    }

    csv_writer.flush()?;
    Ok(transactions.len())
}
