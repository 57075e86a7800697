use std::sync::Arc;

use serde_json::{Value, json};
use uuid::Uuid;

use crate::config::Config;
use crate::domain::{
    Cents, Transaction, TransactionId, TransactionStatus, TransactionType, TransferOutcome,
    Wallet, WalletId, validate_amount,
};
use crate::storage::{BatchPersistence, SqliteStore, WalletRepository, sqlite};

use super::{AppError, LogPublisher, WithdrawalOrder, WithdrawalPublisher, WithdrawalRequest};

/// Response produced by the request boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub body: Value,
}

impl Response {
    fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    fn message(status: u16, message: impl Into<Value>) -> Self {
        Self::new(status, json!({ "message": message.into() }))
    }
}

/// Settings the service needs beyond storage.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub withdrawal_topic: String,
    pub allowed_currencies: Vec<String>,
}

impl From<&Config> for ServiceSettings {
    fn from(config: &Config) -> Self {
        Self {
            withdrawal_topic: config.withdrawal_topic.clone(),
            allowed_currencies: config.allowed_currencies.clone(),
        }
    }
}

/// Application service providing the wallet use cases.
/// Each mutating call loads the wallet, applies the ledger operation and
/// persists the new transaction; nothing is written when validation fails.
pub struct WalletService {
    repo: WalletRepository,
    publisher: Arc<dyn WithdrawalPublisher>,
    settings: ServiceSettings,
}

impl WalletService {
    pub fn new(
        repo: WalletRepository,
        publisher: Arc<dyn WithdrawalPublisher>,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            repo,
            publisher,
            settings,
        }
    }

    /// Initialize a new database from `config`.
    pub async fn init(config: &Config) -> Result<Self, AppError> {
        Self::open(config, true).await
    }

    /// Connect to an existing database.
    pub async fn connect(config: &Config) -> Result<Self, AppError> {
        Self::open(config, false).await
    }

    async fn open(config: &Config, create: bool) -> Result<Self, AppError> {
        config
            .validate()
            .map_err(|e| AppError::Config(e.to_string()))?;

        let url = config.database_url(create);
        let pool = if create {
            sqlite::init(&url).await?
        } else {
            sqlite::connect(&url).await?
        };

        let batch = BatchPersistence::new(config.batch_config())?;
        let repo = WalletRepository::new(
            Arc::new(SqliteStore::new(pool.clone(), config.wallets_table.clone())),
            Arc::new(SqliteStore::new(pool, config.transactions_table.clone())),
            batch,
        );
        Ok(Self::new(repo, Arc::new(LogPublisher), config.into()))
    }

    pub fn repository(&self) -> &WalletRepository {
        &self.repo
    }

    // ========================
    // Wallet operations
    // ========================

    /// Create and persist a new, empty wallet.
    pub async fn create_wallet(&self, name: &str) -> Result<Wallet, AppError> {
        let mut wallet = Wallet::new(name)?;
        let id = self.repo.save(&mut wallet).await?;
        tracing::info!(wallet_id = %id, name, "Created wallet");
        Ok(wallet)
    }

    pub async fn get_wallet(&self, id: WalletId) -> Result<Wallet, AppError> {
        self.repo
            .find(id)
            .await?
            .ok_or_else(|| AppError::UnknownWallet(id.to_string()))
    }

    pub async fn list_wallets(&self) -> Result<Vec<Wallet>, AppError> {
        Ok(self.repo.list_wallets().await?)
    }

    pub async fn list_balance(&self, id: WalletId) -> Result<Vec<String>, AppError> {
        Ok(self.get_wallet(id).await?.list_balance())
    }

    /// Ledger entries for a wallet, optionally restricted to one type.
    pub async fn transactions(
        &self,
        id: WalletId,
        filter: Option<TransactionType>,
    ) -> Result<Vec<Transaction>, AppError> {
        let wallet = self.get_wallet(id).await?;
        Ok(match filter {
            Some(kind) => wallet
                .filter_transactions(kind)
                .into_iter()
                .cloned()
                .collect(),
            None => wallet.transactions().to_vec(),
        })
    }

    // ========================
    // Ledger operations
    // ========================

    pub async fn top_up(
        &self,
        id: WalletId,
        amount: Cents,
        currency: &str,
    ) -> Result<Transaction, AppError> {
        let mut wallet = self.get_wallet(id).await?;
        let tx = wallet.top_up(amount, currency)?;
        self.repo.save_transaction(&wallet, &tx).await?;

        tracing::info!(wallet_id = %id, transaction_id = %tx.id, amount, currency, "Top-up recorded");
        Ok(tx)
    }

    pub async fn withdraw(
        &self,
        id: WalletId,
        amount: Cents,
        currency: &str,
    ) -> Result<Transaction, AppError> {
        let mut wallet = self.get_wallet(id).await?;
        let tx = wallet.withdraw(amount, currency)?;
        self.repo.save_transaction(&wallet, &tx).await?;

        tracing::info!(wallet_id = %id, transaction_id = %tx.id, amount, currency, "Withdrawal recorded");
        Ok(tx)
    }

    /// Move money between two wallets. Both ledger entries are written in one
    /// store request.
    pub async fn transfer(
        &self,
        from: WalletId,
        to: WalletId,
        amount: Cents,
        currency: &str,
    ) -> Result<TransferOutcome, AppError> {
        validate_amount(amount)?;
        if from == to {
            return Err(AppError::validation("Cannot transfer to the same wallet"));
        }

        let mut source = self.get_wallet(from).await?;
        let mut target = self.get_wallet(to).await?;
        let outcome = source.transfer(amount, currency, &mut target)?;
        self.repo.save_transfer(&source, &target, &outcome).await?;

        tracing::info!(from = %from, to = %to, amount, currency, "Transfer recorded");
        Ok(outcome)
    }

    /// Move a pending transaction to `status`.
    pub async fn set_transaction_status(
        &self,
        wallet_id: WalletId,
        transaction_id: TransactionId,
        status: TransactionStatus,
    ) -> Result<Transaction, AppError> {
        let mut wallet = self.get_wallet(wallet_id).await?;
        let tx = wallet
            .set_transaction_status(transaction_id, status)?
            .clone();
        self.repo.save_transaction(&wallet, &tx).await?;

        tracing::info!(wallet_id = %wallet_id, transaction_id = %tx.id, status = %status, "Transaction status updated");
        Ok(tx)
    }

    pub async fn complete_transaction(
        &self,
        wallet_id: WalletId,
        transaction_id: TransactionId,
    ) -> Result<Transaction, AppError> {
        self.set_transaction_status(wallet_id, transaction_id, TransactionStatus::Completed)
            .await
    }

    pub async fn fail_transaction(
        &self,
        wallet_id: WalletId,
        transaction_id: TransactionId,
    ) -> Result<Transaction, AppError> {
        self.set_transaction_status(wallet_id, transaction_id, TransactionStatus::Failed)
            .await
    }

    // ========================
    // Request boundary
    // ========================

    /// Handle a withdrawal request for the wallet identified by `wallet_id`.
    ///
    /// Malformed input and ledger rule violations become 4xx responses with a
    /// message; anything else becomes an opaque 500.
    pub async fn handle_withdrawal(&self, wallet_id: Option<&str>, body: &str) -> Response {
        let payload: Value = match serde_json::from_str(body) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::debug!(error = %e, "Rejecting unparsable withdrawal body");
                return Response::message(400, "Bad Request");
            }
        };

        let request =
            match WithdrawalRequest::from_payload(&payload, &self.settings.allowed_currencies) {
                Ok(request) => request,
                Err(errors) => return Response::message(400, errors),
            };

        let Some(id) = wallet_id.and_then(|id| Uuid::parse_str(id).ok()) else {
            tracing::debug!(?wallet_id, "Rejecting withdrawal without a valid wallet id");
            return Response::message(400, "Bad Request");
        };

        let tx = match self.withdraw(id, request.amount, &request.currency).await {
            Ok(tx) => tx,
            Err(err) if err.is_client_error() => {
                return Response::message(err.status_code(), err.to_string());
            }
            Err(err) => {
                tracing::error!(error = %err, wallet_id = %id, "Withdrawal failed");
                return Response::message(500, "Internal Server Error");
            }
        };

        let order = WithdrawalOrder::new(request.iban, request.currency, request.amount);
        if let Err(e) = self
            .publisher
            .publish(&self.settings.withdrawal_topic, &order)
            .await
        {
            tracing::warn!(error = %e, transaction_id = %tx.id, "Failed to publish withdrawal order");
        }

        match serde_json::to_value(&tx) {
            Ok(body) => Response::new(200, body),
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode transaction");
                Response::message(500, "Internal Server Error")
            }
        }
    }
}
