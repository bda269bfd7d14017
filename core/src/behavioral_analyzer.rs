//! BehavioralAnalyzer — account age and history consistency.

use crate::{
    analysis::AgentAnalysis,
    analyzer::{Analyzer, AnalyzerKind, Assessment},
    error::AceResult,
    playbook::{Bullet, Comparator, Feature, HeuristicRule},
    transaction::Transaction,
};

const NEW_ACCOUNT_DAYS: u32 = 30;
const YOUNG_ACCOUNT_DAYS: u32 = 90;
const ESTABLISHED_DAYS: u32 = 365;
const LIMITED_HISTORY: u32 = 10;
const STRONG_HISTORY: u32 = 50;
const HIGH_VALUE: f64 = 1_000.0;

#[derive(Debug, Default, Clone, Copy)]
pub struct BehavioralAnalyzer {
    pub discovery_delta: f64,
}

impl BehavioralAnalyzer {
    pub fn new(discovery_delta: f64) -> Self {
        Self { discovery_delta }
    }
}

impl Analyzer for BehavioralAnalyzer {
    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::BehavioralAnalyzer
    }

    fn analyze(&self, tx: &Transaction, bullets: &[&Bullet]) -> AceResult<AgentAnalysis> {
        let mut a = Assessment::new(5.0);

        if tx.user_age_days < NEW_ACCOUNT_DAYS {
            a.add(35.0, format!("Very new account ({} days)", tx.user_age_days));
        } else if tx.user_age_days < YOUNG_ACCOUNT_DAYS {
            a.add(15.0, format!("Young account ({} days)", tx.user_age_days));
        }

        if tx.total_transactions == 0 {
            a.add(20.0, "No transaction history");
        } else if tx.total_transactions < LIMITED_HISTORY {
            a.add(10.0, format!("Limited transaction history ({})", tx.total_transactions));
        }

        if tx.amount >= HIGH_VALUE && tx.total_transactions < LIMITED_HISTORY {
            a.add(25.0, "Sudden high-value anomaly");
        }

        if tx.user_age_days >= ESTABLISHED_DAYS && tx.total_transactions >= STRONG_HISTORY {
            a.add(-5.0, "Well-established account");
            a.note("Strong transaction history");
            a.note("Consistent behavior");
        }

        Ok(a.finish(self.kind(), tx, bullets, 0.65))
    }

    fn propose_heuristic(&self, tx: &Transaction, is_fraud: bool) -> Option<HeuristicRule> {
        let rule = if is_fraud {
            HeuristicRule::new(
                Feature::AccountAgeDays,
                Comparator::AtMost,
                tx.user_age_days as f64,
                self.discovery_delta,
            )
        } else if tx.total_transactions > 0 {
            HeuristicRule::new(
                Feature::TotalTransactions,
                Comparator::AtLeast,
                tx.total_transactions as f64,
                -self.discovery_delta,
            )
        } else {
            HeuristicRule::new(
                Feature::AccountAgeDays,
                Comparator::AtLeast,
                tx.user_age_days as f64,
                -self.discovery_delta,
            )
        };
        Some(rule)
    }
}
