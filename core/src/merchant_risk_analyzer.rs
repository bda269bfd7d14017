//! MerchantRiskAnalyzer — merchant reputation.

use crate::{
    analysis::AgentAnalysis,
    analyzer::{floor_to, Analyzer, AnalyzerKind, Assessment},
    error::AceResult,
    playbook::{Bullet, Comparator, Feature, HeuristicRule},
    transaction::Transaction,
};

const VERY_LOW_RATING: f64 = 2.5;
const LOW_RATING: f64 = 3.5;
const EXCELLENT_RATING: f64 = 4.5;
const MANY_REPORTS: u32 = 20;
const SOME_REPORTS: u32 = 5;

#[derive(Debug, Default, Clone, Copy)]
pub struct MerchantRiskAnalyzer {
    pub discovery_delta: f64,
}

impl MerchantRiskAnalyzer {
    pub fn new(discovery_delta: f64) -> Self {
        Self { discovery_delta }
    }
}

impl Analyzer for MerchantRiskAnalyzer {
    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::MerchantRiskAnalyzer
    }

    fn analyze(&self, tx: &Transaction, bullets: &[&Bullet]) -> AceResult<AgentAnalysis> {
        let mut a = Assessment::new(5.0);
        let rating = tx.merchant_rating;

        if rating < VERY_LOW_RATING {
            a.add(40.0, format!("Merchant rating very low ({rating:.1}/5.0)"));
        } else if rating < LOW_RATING {
            a.add(20.0, format!("Below-average merchant rating ({rating:.1}/5.0)"));
        } else if rating >= EXCELLENT_RATING {
            a.note(format!("Excellent merchant rating ({rating:.1}/5.0)"));
        }

        let reports = tx.merchant_fraud_reports;
        match reports {
            0 => a.note("No fraud reports"),
            r if r >= MANY_REPORTS => a.add(45.0, format!("{r} fraud reports against {}", tx.merchant)),
            r if r >= SOME_REPORTS => a.add(25.0, format!("{r} fraud reports against {}", tx.merchant)),
            r => a.add(10.0, format!("{r} fraud report(s) on file")),
        }

        if rating >= EXCELLENT_RATING && reports == 0 {
            a.note("Reputable merchant");
        }

        Ok(a.finish(self.kind(), tx, bullets, 0.68))
    }

    fn propose_heuristic(&self, tx: &Transaction, is_fraud: bool) -> Option<HeuristicRule> {
        let rule = if is_fraud {
            if tx.merchant_fraud_reports > 0 {
                HeuristicRule::new(
                    Feature::MerchantFraudReports,
                    Comparator::AtLeast,
                    tx.merchant_fraud_reports as f64,
                    self.discovery_delta,
                )
            } else {
                let threshold = (tx.merchant_rating * 10.0).ceil() / 10.0;
                HeuristicRule::new(Feature::MerchantRating, Comparator::AtMost, threshold, self.discovery_delta)
            }
        } else {
            HeuristicRule::new(
                Feature::MerchantRating,
                Comparator::AtLeast,
                floor_to(tx.merchant_rating, 0.1),
                -self.discovery_delta,
            )
        };
        Some(rule)
    }
}
