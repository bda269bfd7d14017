//! Labeled transaction datasets for experiments.
//!
//! Datasets come either from a JSON file (an array of transactions, each
//! carrying an `is_fraud` label) or from the seeded synthetic generator.

use crate::{
    error::{AceError, AceResult},
    rng::{RngBank, StreamRng, StreamSlot},
    transaction::{Transaction, TransactionInput},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LabeledTransaction {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub is_fraud: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct LabeledInput {
    #[serde(flatten)]
    transaction: TransactionInput,
    is_fraud: Option<bool>,
}

/// Parse and validate a JSON array of labeled transactions.
pub fn parse_dataset(json: &str) -> AceResult<Vec<LabeledTransaction>> {
    let inputs: Vec<LabeledInput> = serde_json::from_str(json)?;
    inputs
        .into_iter()
        .enumerate()
        .map(|(idx, input)| {
            let is_fraud = input.is_fraud.ok_or_else(|| {
                AceError::invalid_field("is_fraud", format!("is required (item {idx})"))
            })?;
            let transaction = input.transaction.validate().map_err(|e| match e {
                AceError::InvalidTransaction { field, reason } => AceError::InvalidTransaction {
                    field,
                    reason: format!("{reason} (item {idx})"),
                },
                other => other,
            })?;
            Ok(LabeledTransaction { transaction, is_fraud })
        })
        .collect()
}

pub fn load_dataset(path: &str) -> anyhow::Result<Vec<LabeledTransaction>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
    Ok(parse_dataset(&content)?)
}

// ── Synthetic generator ──────────────────────────────────────────────────────

const HOME_LOCATIONS: [&str; 8] = [
    "New York, NY",
    "Los Angeles, CA",
    "Chicago, IL",
    "Houston, TX",
    "Miami, FL",
    "Seattle, WA",
    "Denver, CO",
    "Boston, MA",
];

const REMOTE_LOCATIONS: [&str; 4] = ["Lagos, NG", "Bucharest, RO", "Unknown (VPN)", "Manila, PH"];

const GOOD_MERCHANTS: [&str; 6] = [
    "Whole Foods",
    "Amazon",
    "Shell",
    "Target",
    "Delta Air Lines",
    "Apple Store",
];

const SHADY_MERCHANTS: [&str; 4] = [
    "QuickCash Electronics",
    "LuxuryDeals247",
    "GiftCardHub",
    "CryptoSwapNow",
];

/// Shape of a generated transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Archetype {
    Legitimate,
    NewAccountFraud,
    AccountTakeover,
    MerchantCollusion,
}

pub struct SyntheticDataset {
    labels: StreamRng,
    profiles: StreamRng,
    fraud_rate: f64,
    next_user: u64,
}

impl SyntheticDataset {
    pub fn new(seed: u64, fraud_rate: f64) -> Self {
        let bank = RngBank::new(seed);
        Self {
            labels: bank.for_stream(StreamSlot::Labels),
            profiles: bank.for_stream(StreamSlot::Profiles),
            fraud_rate: fraud_rate.clamp(0.0, 1.0),
            next_user: 0,
        }
    }

    /// Generate `n` labeled transactions. Same seed, same output.
    pub fn generate(seed: u64, n: usize, fraud_rate: f64) -> Vec<LabeledTransaction> {
        let mut gen = Self::new(seed, fraud_rate);
        (0..n).map(|_| gen.next_item()).collect()
    }

    pub fn next_item(&mut self) -> LabeledTransaction {
        let archetype = if self.labels.chance(self.fraud_rate) {
            match self.labels.next_u64_below(3) {
                0 => Archetype::NewAccountFraud,
                1 => Archetype::AccountTakeover,
                _ => Archetype::MerchantCollusion,
            }
        } else {
            Archetype::Legitimate
        };
        self.next_user += 1;
        let transaction = self.build(archetype);
        LabeledTransaction {
            transaction,
            is_fraud: archetype != Archetype::Legitimate,
        }
    }

    fn build(&mut self, archetype: Archetype) -> Transaction {
        let rng = &mut self.profiles;
        let home = rng.pick(&HOME_LOCATIONS).to_string();

        let (user_age_days, total_transactions, amount, hour) = match archetype {
            Archetype::Legitimate => {
                let age = rng.range_u32(60, 3_000);
                let total = (age as f64 * rng.range_f64(0.05, 1.5)) as u32;
                let amount = rng.pareto(15.0, 1.6).min(4_500.0);
                (age, total, amount, rng.range_u32(7, 22))
            }
            Archetype::NewAccountFraud => {
                let age = rng.range_u32(1, 20);
                let total = rng.range_u32(0, 3);
                (age, total, rng.range_f64(1_500.0, 9_000.0), rng.range_u32(0, 23))
            }
            Archetype::AccountTakeover => {
                let age = rng.range_u32(200, 2_000);
                let total = rng.range_u32(50, 800);
                let hour = if rng.chance(0.6) { rng.range_u32(0, 5) } else { rng.range_u32(6, 23) };
                (age, total, rng.range_f64(800.0, 6_000.0), hour)
            }
            Archetype::MerchantCollusion => {
                let age = rng.range_u32(30, 1_500);
                let total = rng.range_u32(5, 300);
                (age, total, rng.range_f64(100.0, 2_500.0), rng.range_u32(8, 23))
            }
        };

        let (merchant, merchant_rating, merchant_fraud_reports) = match archetype {
            Archetype::MerchantCollusion => (
                rng.pick(&SHADY_MERCHANTS).to_string(),
                rng.range_f64(1.0, 2.8),
                rng.range_u32(8, 60),
            ),
            Archetype::NewAccountFraud => {
                if rng.chance(0.5) {
                    (rng.pick(&SHADY_MERCHANTS).to_string(), rng.range_f64(1.5, 3.5), rng.range_u32(5, 30))
                } else {
                    (rng.pick(&GOOD_MERCHANTS).to_string(), rng.range_f64(3.5, 5.0), rng.range_u32(0, 3))
                }
            }
            _ => {
                let reports = if rng.chance(0.85) { 0 } else { rng.range_u32(1, 3) };
                (rng.pick(&GOOD_MERCHANTS).to_string(), rng.range_f64(3.5, 5.0), reports)
            }
        };

        let change_probability = match archetype {
            Archetype::Legitimate => 0.08,
            Archetype::NewAccountFraud => 0.6,
            Archetype::AccountTakeover => 0.9,
            Archetype::MerchantCollusion => 0.3,
        };
        let location = if rng.chance(change_probability) {
            if archetype == Archetype::Legitimate {
                rng.pick(&HOME_LOCATIONS).to_string()
            } else {
                rng.pick(&REMOTE_LOCATIONS).to_string()
            }
        } else {
            home.clone()
        };
        let minute = rng.range_u32(0, 59);

        Transaction {
            user_id: format!("user-{:06}", self.next_user),
            user_age_days,
            total_transactions,
            amount: (amount * 100.0).round() / 100.0,
            time: format!("{hour:02}:{minute:02}"),
            merchant,
            merchant_rating: (merchant_rating * 10.0).round() / 10.0,
            merchant_fraud_reports,
            location,
            previous_location: Some(home),
        }
    }
}
