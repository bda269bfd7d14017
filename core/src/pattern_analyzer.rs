//! PatternDetector — amount bands and fraud-signature shapes.

use crate::{
    analysis::AgentAnalysis,
    analyzer::{ceil_to, floor_to, Analyzer, AnalyzerKind, Assessment},
    error::AceResult,
    playbook::{Bullet, Comparator, Feature, HeuristicRule},
    transaction::Transaction,
};

const HIGH_AMOUNT: f64 = 5_000.0;
const ELEVATED_AMOUNT: f64 = 1_000.0;
const ROUND_AMOUNT_MIN: f64 = 500.0;
const NEW_ACCOUNT_DAYS: u32 = 30;
const THIN_HISTORY: u32 = 5;

#[derive(Debug, Default, Clone, Copy)]
pub struct PatternDetector {
    /// Points added to a proposed heuristic.
    pub discovery_delta: f64,
}

impl PatternDetector {
    pub fn new(discovery_delta: f64) -> Self {
        Self { discovery_delta }
    }
}

impl Analyzer for PatternDetector {
    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::PatternDetector
    }

    fn analyze(&self, tx: &Transaction, bullets: &[&Bullet]) -> AceResult<AgentAnalysis> {
        let mut a = Assessment::new(10.0);

        if tx.amount >= HIGH_AMOUNT {
            a.add(35.0, "Unusually high transaction amount");
        } else if tx.amount >= ELEVATED_AMOUNT {
            a.add(15.0, "Elevated transaction amount");
        }

        if tx.total_transactions <= 1 && tx.user_age_days < NEW_ACCOUNT_DAYS {
            a.add(20.0, "First transaction on new account");
        }

        if tx.amount >= ROUND_AMOUNT_MIN && tx.amount % 100.0 == 0.0 {
            a.add(10.0, format!("Round-number amount (${:.0})", tx.amount));
        }

        if tx.total_transactions < THIN_HISTORY && tx.amount >= ELEVATED_AMOUNT {
            a.add(15.0, "Pattern matches fraud signatures: high value on thin history");
        }

        if a.score() <= 10.0 {
            a.note("Consistent transaction pattern");
            a.note("Amount within normal range");
        }

        Ok(a.finish(self.kind(), tx, bullets, 0.60))
    }

    fn propose_heuristic(&self, tx: &Transaction, is_fraud: bool) -> Option<HeuristicRule> {
        let rule = if is_fraud {
            let threshold = floor_to(tx.amount, 100.0).max(100.0);
            HeuristicRule::new(Feature::Amount, Comparator::AtLeast, threshold, self.discovery_delta)
        } else {
            let threshold = ceil_to(tx.amount, 100.0);
            HeuristicRule::new(Feature::Amount, Comparator::AtMost, threshold, -self.discovery_delta)
        };
        Some(rule)
    }
}
