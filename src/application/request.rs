use serde_json::Value;

use crate::domain::{Cents, ParseCentsError, parse_cents};

/// A validated withdrawal order coming in from the request boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawalRequest {
    pub iban: String,
    pub amount: Cents,
    pub currency: String,
}

impl WithdrawalRequest {
    /// Check `payload` against the withdrawal rules, collecting every violation.
    pub fn from_payload(payload: &Value, allowed_currencies: &[String]) -> Result<Self, Vec<String>> {
        let mut errors = Vec::new();

        let iban = match payload.get("iban") {
            Some(Value::String(iban)) if !iban.trim().is_empty() => Some(iban.trim().to_string()),
            Some(Value::String(_)) | None | Some(Value::Null) => {
                errors.push("iban is required".to_string());
                None
            }
            Some(_) => {
                errors.push("iban must be a string".to_string());
                None
            }
        };

        let amount = match payload.get("amount") {
            None | Some(Value::Null) => {
                errors.push("amount is required".to_string());
                None
            }
            Some(Value::Number(number)) => match parse_cents(&number.to_string()) {
                Ok(cents) if cents > 0 => Some(cents),
                Ok(_) => {
                    errors.push("amount must be greater than 0".to_string());
                    None
                }
                Err(ParseCentsError::TooPrecise) => {
                    errors.push("amount must have at most 2 decimal places".to_string());
                    None
                }
                Err(_) => {
                    errors.push("amount must be a number".to_string());
                    None
                }
            },
            Some(_) => {
                errors.push("amount must be a number".to_string());
                None
            }
        };

        let currency = match payload.get("currency") {
            None | Some(Value::Null) => {
                errors.push("currency is required".to_string());
                None
            }
            Some(Value::String(code)) if allowed_currencies.iter().any(|c| c == code) => {
                Some(code.clone())
            }
            Some(_) => {
                errors.push(format!(
                    "currency must be one of [{}]",
                    allowed_currencies.join(", ")
                ));
                None
            }
        };

        match (iban, amount, currency) {
            (Some(iban), Some(amount), Some(currency)) if errors.is_empty() => Ok(Self {
                iban,
                amount,
                currency,
            }),
            _ => Err(errors),
        }
    }
}
