//! GeographicAnalyzer — location plausibility.

use crate::{
    analysis::AgentAnalysis,
    analyzer::{Analyzer, AnalyzerKind, Assessment},
    error::AceResult,
    playbook::{Bullet, Comparator, Feature, HeuristicRule},
    transaction::Transaction,
};

/// Location markers that indicate an obscured or high-risk origin.
const HIGH_RISK_MARKERS: [&str; 5] = ["unknown", "vpn", "proxy", "tor exit", "anonymous"];
const NEW_ACCOUNT_DAYS: u32 = 30;

#[derive(Debug, Default, Clone, Copy)]
pub struct GeographicAnalyzer {
    pub discovery_delta: f64,
}

impl GeographicAnalyzer {
    pub fn new(discovery_delta: f64) -> Self {
        Self { discovery_delta }
    }
}

impl Analyzer for GeographicAnalyzer {
    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::GeographicAnalyzer
    }

    fn analyze(&self, tx: &Transaction, bullets: &[&Bullet]) -> AceResult<AgentAnalysis> {
        let mut a = Assessment::new(10.0);
        let changed = tx.location_changed();

        if changed {
            let prev = tx.previous_location.as_deref().unwrap_or_default();
            a.add(40.0, format!("Drastic location change ({prev} -> {})", tx.location));
            if tx.is_night() {
                a.add(15.0, format!("Location change at suspicious time ({})", tx.time));
            }
            if tx.user_age_days < NEW_ACCOUNT_DAYS {
                a.add(10.0, "New account transacting from a new location");
            }
        }

        let location = tx.location.to_ascii_lowercase();
        if HIGH_RISK_MARKERS.iter().any(|m| location.contains(m)) {
            a.add(25.0, format!("High-risk geographic region ({})", tx.location));
        }

        if !changed && a.score() <= 10.0 {
            a.note("Location consistent");
            a.note("No geographic anomalies");
        }

        Ok(a.finish(self.kind(), tx, bullets, 0.62))
    }

    fn propose_heuristic(&self, tx: &Transaction, is_fraud: bool) -> Option<HeuristicRule> {
        match (is_fraud, tx.location_changed()) {
            (true, true) => Some(HeuristicRule::new(
                Feature::LocationChanged,
                Comparator::AtLeast,
                1.0,
                self.discovery_delta,
            )),
            (true, false) if tx.is_night() => Some(HeuristicRule::new(
                Feature::HourOfDay,
                Comparator::AtMost,
                tx.hour() as f64,
                self.discovery_delta,
            )),
            (false, true) => Some(HeuristicRule::new(
                Feature::LocationChanged,
                Comparator::AtLeast,
                1.0,
                -self.discovery_delta,
            )),
            _ => None,
        }
    }
}
