//! VelocityChecker — transaction frequency against account life.

use crate::{
    analysis::AgentAnalysis,
    analyzer::{Analyzer, AnalyzerKind, Assessment},
    error::AceResult,
    playbook::{Bullet, Comparator, Feature, HeuristicRule},
    transaction::Transaction,
};

const MAX_DAILY_VELOCITY: f64 = 5.0;
const SPIKE_AMOUNT: f64 = 3_000.0;
const SPIKE_HISTORY: u32 = 20;

#[derive(Debug, Default, Clone, Copy)]
pub struct VelocityChecker {
    pub discovery_delta: f64,
}

impl VelocityChecker {
    pub fn new(discovery_delta: f64) -> Self {
        Self { discovery_delta }
    }
}

impl Analyzer for VelocityChecker {
    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::VelocityChecker
    }

    fn analyze(&self, tx: &Transaction, bullets: &[&Bullet]) -> AceResult<AgentAnalysis> {
        let mut a = Assessment::new(10.0);
        let velocity = tx.daily_velocity();

        if velocity > MAX_DAILY_VELOCITY {
            a.add(30.0, format!("{velocity:.1} transactions per day exceeds normal velocity"));
        }

        if tx.total_transactions == 0 {
            a.add(20.0, "First transaction with no velocity data");
        }

        if tx.amount >= SPIKE_AMOUNT && tx.total_transactions < SPIKE_HISTORY {
            a.add(30.0, "Amount significantly higher than typical");
        }

        if tx.is_night() {
            a.add(10.0, format!("Activity at unusual hour ({})", tx.time));
        }

        if a.score() <= 10.0 {
            a.note("Transaction velocity within normal parameters");
            a.note("Amount consistent with history");
        }

        Ok(a.finish(self.kind(), tx, bullets, 0.55))
    }

    fn propose_heuristic(&self, tx: &Transaction, is_fraud: bool) -> Option<HeuristicRule> {
        let velocity = (tx.daily_velocity() * 100.0).round() / 100.0;
        let rule = if is_fraud {
            if tx.total_transactions == 0 {
                HeuristicRule::new(Feature::TotalTransactions, Comparator::AtMost, 0.0, self.discovery_delta)
            } else {
                HeuristicRule::new(Feature::DailyVelocity, Comparator::AtLeast, velocity, self.discovery_delta)
            }
        } else {
            HeuristicRule::new(Feature::DailyVelocity, Comparator::AtMost, velocity, -self.discovery_delta)
        };
        Some(rule)
    }
}
