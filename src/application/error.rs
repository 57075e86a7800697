use thiserror::Error;

use crate::domain::LedgerError;
use crate::storage::StoreError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Wallet not found: {0}")]
    UnknownWallet(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("Invalid request: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(vec![message.into()])
    }

    /// HTTP-style status for the request boundary.
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::UnknownWallet(_) => 404,
            AppError::Ledger(LedgerError::TransactionNotFound(_)) => 404,
            AppError::Ledger(LedgerError::CorruptHistory(_)) => 500,
            AppError::Ledger(_) | AppError::Validation(_) => 400,
            AppError::Store(_) | AppError::Config(_) | AppError::Database(_) => 500,
        }
    }

    /// Client errors carry a message meant for the caller; everything else is
    /// reported opaquely.
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }
}
