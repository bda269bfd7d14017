//! Scoring pipeline: Transaction → registry → aggregator → result.

use crate::{
    aggregator::Aggregator,
    analysis::{FraudAnalysisResult, Mode},
    playbook::Playbook,
    registry::AnalyzerRegistry,
    transaction::Transaction,
};
use chrono::Utc;

pub struct Pipeline {
    pub registry: AnalyzerRegistry,
    pub aggregator: Aggregator,
}

impl Pipeline {
    pub fn new(registry: AnalyzerRegistry, aggregator: Aggregator) -> Self {
        Self { registry, aggregator }
    }

    /// Score one transaction against one playbook snapshot.
    /// Vanilla mode ignores `playbook` entirely.
    pub fn score(&self, tx: &Transaction, mode: Mode, playbook: &Playbook) -> FraudAnalysisResult {
        let empty = Playbook::empty();
        let (active, playbook_version) = match mode {
            Mode::Vanilla => (&empty, 0),
            Mode::OfflineAce | Mode::OnlineAce => (playbook, playbook.version),
        };

        let run = self.registry.run_all(tx, active);
        let aggregate = self.aggregator.aggregate(&run.results, mode);

        log::debug!(
            "scored {} mode={} playbook=v{playbook_version} risk={:.2} decision={}",
            tx.user_id,
            mode.as_str(),
            aggregate.risk_score,
            aggregate.decision.as_str()
        );

        FraudAnalysisResult {
            analysis_id: uuid::Uuid::new_v4().to_string(),
            mode,
            playbook_version,
            transaction: tx.clone(),
            decision: aggregate.decision,
            confidence: aggregate.confidence,
            risk_score: aggregate.risk_score,
            reasoning: aggregate.reasoning,
            analyzer_results: run.results,
            risk_breakdown: aggregate.breakdown,
            analyzer_errors: run.faults,
            timestamp: Utc::now(),
        }
    }
}
