use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{Cents, format_cents};

/// Instruction for the payout side to send money to an external account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalOrder {
    pub target_iban: String,
    pub currency: String,
    /// Decimal string with two fraction digits, e.g. "50.00"
    pub amount: String,
}

impl WithdrawalOrder {
    pub fn new(target_iban: impl Into<String>, currency: impl Into<String>, amount: Cents) -> Self {
        Self {
            target_iban: target_iban.into(),
            currency: currency.into(),
            amount: format_cents(amount),
        }
    }
}

/// Fire-and-forget delivery of withdrawal orders to a topic.
#[async_trait]
pub trait WithdrawalPublisher: Send + Sync {
    async fn publish(&self, topic: &str, order: &WithdrawalOrder) -> Result<()>;
}

/// Publisher that only writes the order to the log.
#[derive(Debug, Default, Clone)]
pub struct LogPublisher;

#[async_trait]
impl WithdrawalPublisher for LogPublisher {
    async fn publish(&self, topic: &str, order: &WithdrawalOrder) -> Result<()> {
        let payload = serde_json::to_string(order)?;
        tracing::info!(topic, %payload, "Publishing withdrawal order");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_payload() {
        let order = WithdrawalOrder::new("DE89370400440532013000", "EUR", 5000);
        let json = serde_json::to_value(&order).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "target_iban": "DE89370400440532013000",
                "currency": "EUR",
                "amount": "50.00"
            })
        );
    }

    #[tokio::test]
    async fn test_log_publisher_accepts_orders() {
        let order = WithdrawalOrder::new("X", "USD", 1);
        assert!(LogPublisher.publish("withdrawals", &order).await.is_ok());
    }
}
