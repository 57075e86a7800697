use std::time::Duration;

use anyhow::{Result, bail};
use clap::Args;

use crate::storage::{BatchConfig, DEFAULT_BATCH_SIZE, DEFAULT_MAX_RETRIES};

/// Runtime configuration. Every flag can also be set from the environment
/// (or a `.env` file).
#[derive(Debug, Clone, Args)]
pub struct Config {
    /// Database file path
    #[arg(short, long, env = "EWALLET_DATABASE", default_value = "ewallet.db", global = true)]
    pub database: String,

    /// Namespace holding wallet records
    #[arg(long, env = "WALLETS_TABLE", default_value = "wallets", global = true)]
    pub wallets_table: String,

    /// Namespace holding ledger entries
    #[arg(long, env = "TRANSACTIONS_TABLE", default_value = "transactions", global = true)]
    pub transactions_table: String,

    /// Topic withdrawal orders are published to
    #[arg(long, env = "WITHDRAWAL_TOPIC", default_value = "withdrawals", global = true)]
    pub withdrawal_topic: String,

    /// Maximum keys/items per batched store request
    #[arg(long, env = "BATCH_SIZE", default_value_t = DEFAULT_BATCH_SIZE, global = true)]
    pub batch_size: usize,

    /// Attempts per batch group before it is abandoned
    #[arg(long, env = "MAX_RETRIES", default_value_t = DEFAULT_MAX_RETRIES, global = true)]
    pub max_retries: u32,

    /// Pause between attempts, in milliseconds
    #[arg(long, env = "RETRY_DELAY_MS", default_value_t = 0, global = true)]
    pub retry_delay_ms: u64,

    /// Randomize the pause between attempts
    #[arg(long, env = "RETRY_JITTER", global = true)]
    pub retry_jitter: bool,

    /// Currencies accepted by the withdrawal request handler
    #[arg(
        long,
        env = "ALLOWED_CURRENCIES",
        value_delimiter = ',',
        default_values = ["USD", "EUR"],
        global = true
    )]
    pub allowed_currencies: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: "ewallet.db".to_string(),
            wallets_table: "wallets".to_string(),
            transactions_table: "transactions".to_string(),
            withdrawal_topic: "withdrawals".to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_ms: 0,
            retry_jitter: false,
            allowed_currencies: vec!["USD".to_string(), "EUR".to_string()],
        }
    }
}

impl Config {
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.wallets_table.trim().is_empty() {
            bail!("Wallet table name missing");
        }
        if self.transactions_table.trim().is_empty() {
            bail!("Transactions table name missing");
        }
        if self.wallets_table == self.transactions_table {
            bail!("Wallet and transaction tables must differ");
        }
        if self.withdrawal_topic.trim().is_empty() {
            bail!("Withdrawal topic missing");
        }
        if self.allowed_currencies.is_empty() {
            bail!("At least one allowed currency is required");
        }
        self.batch_config().validate()
    }

    pub fn batch_config(&self) -> BatchConfig {
        BatchConfig {
            batch_size: self.batch_size,
            max_retries: self.max_retries,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            jitter: self.retry_jitter,
        }
    }

    /// SQLite URL for the database; `create` allows the file to be created.
    pub fn database_url(&self, create: bool) -> String {
        if create {
            format!("sqlite:{}?mode=rwc", self.database)
        } else {
            format!("sqlite:{}", self.database)
        }
    }
}
