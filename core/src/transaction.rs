//! Transaction input model and validation.
//!
//! RULE: A Transaction is only ever constructed through validate().
//! Malformed input is rejected before any analyzer sees it.

use crate::error::{AceError, AceResult};
use serde::{Deserialize, Serialize};

pub const MAX_MERCHANT_RATING: f64 = 5.0;

/// A validated, immutable transaction. Deserializing one goes through
/// the same checks as `TransactionInput::validate`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "TransactionInput")]
pub struct Transaction {
    pub user_id: String,
    pub user_age_days: u32,
    pub total_transactions: u32,
    pub amount: f64,
    pub time: String,
    pub merchant: String,
    pub merchant_rating: f64,
    pub merchant_fraud_reports: u32,
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_location: Option<String>,
}

/// Lenient wire form. Every field is optional so missing fields
/// surface as a validation error instead of a serde error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionInput {
    pub user_id: Option<String>,
    pub user_age_days: Option<i64>,
    pub total_transactions: Option<i64>,
    pub amount: Option<f64>,
    pub time: Option<String>,
    pub merchant: Option<String>,
    pub merchant_rating: Option<f64>,
    pub merchant_fraud_reports: Option<i64>,
    pub location: Option<String>,
    #[serde(default)]
    pub previous_location: Option<String>,
}

impl TransactionInput {
    pub fn validate(self) -> AceResult<Transaction> {
        let user_id = required_text("user_id", self.user_id)?;
        let user_age_days = required_count("user_age_days", self.user_age_days)?;
        let total_transactions = required_count("total_transactions", self.total_transactions)?;

        let amount = self
            .amount
            .ok_or_else(|| AceError::invalid_field("amount", "is required"))?;
        if !amount.is_finite() || amount < 0.0 {
            return Err(AceError::invalid_field("amount", "must be a finite, non-negative number"));
        }

        let time = required_text("time", self.time)?;
        if parse_hour_minute(&time).is_none() {
            return Err(AceError::invalid_field("time", "must be HH:MM (24h)"));
        }

        let merchant = required_text("merchant", self.merchant)?;

        let merchant_rating = self
            .merchant_rating
            .ok_or_else(|| AceError::invalid_field("merchant_rating", "is required"))?;
        if !merchant_rating.is_finite() || !(0.0..=MAX_MERCHANT_RATING).contains(&merchant_rating) {
            return Err(AceError::invalid_field("merchant_rating", "must be within 0.0-5.0"));
        }

        let merchant_fraud_reports =
            required_count("merchant_fraud_reports", self.merchant_fraud_reports)?;
        let location = required_text("location", self.location)?;

        // An empty previous location is treated as absent.
        let previous_location = self
            .previous_location
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());

        Ok(Transaction {
            user_id,
            user_age_days,
            total_transactions,
            amount,
            time,
            merchant,
            merchant_rating,
            merchant_fraud_reports,
            location,
            previous_location,
        })
    }
}

impl TryFrom<TransactionInput> for Transaction {
    type Error = AceError;

    fn try_from(input: TransactionInput) -> AceResult<Self> {
        input.validate()
    }
}

fn required_text(field: &str, value: Option<String>) -> AceResult<String> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        Some(_) => Err(AceError::invalid_field(field, "must not be empty")),
        None => Err(AceError::invalid_field(field, "is required")),
    }
}

fn required_count(field: &str, value: Option<i64>) -> AceResult<u32> {
    let v = value.ok_or_else(|| AceError::invalid_field(field, "is required"))?;
    u32::try_from(v).map_err(|_| AceError::invalid_field(field, "must be a non-negative integer"))
}

fn parse_hour_minute(time: &str) -> Option<(u32, u32)> {
    let (h, m) = time.split_once(':')?;
    let hour: u32 = h.parse().ok()?;
    let minute: u32 = m.parse().ok()?;
    (hour < 24 && minute < 60).then_some((hour, minute))
}

impl Transaction {
    /// Parse and validate a transaction from its JSON wire form.
    pub fn from_json(json: &str) -> AceResult<Self> {
        let input: TransactionInput = serde_json::from_str(json)?;
        input.validate()
    }

    pub fn hour(&self) -> u32 {
        parse_hour_minute(&self.time).map(|(h, _)| h).unwrap_or(12)
    }

    /// 00:00–05:59.
    pub fn is_night(&self) -> bool {
        self.hour() < 6
    }

    pub fn location_changed(&self) -> bool {
        self.previous_location
            .as_deref()
            .is_some_and(|prev| !prev.eq_ignore_ascii_case(&self.location))
    }

    /// Prior transactions per day of account life.
    pub fn daily_velocity(&self) -> f64 {
        self.total_transactions as f64 / self.user_age_days.max(1) as f64
    }
}
