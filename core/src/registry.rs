//! Analyzer registry — the fixed set run for every transaction.
//!
//! RULE: run_all() always returns all five keys. An analyzer that errors
//! or panics is replaced by a neutral, zero-confidence result and the
//! failure is reported as an AnalyzerFault; the analysis itself goes on.

use crate::{
    analysis::{AgentAnalysis, AnalyzerFault},
    analyzer::{Analyzer, AnalyzerKind},
    behavioral_analyzer::BehavioralAnalyzer,
    error::{AceError, AceResult},
    geographic_analyzer::GeographicAnalyzer,
    merchant_risk_analyzer::MerchantRiskAnalyzer,
    pattern_analyzer::PatternDetector,
    playbook::Playbook,
    transaction::Transaction,
    velocity_analyzer::VelocityChecker,
};
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};

/// Outputs of one registry pass.
#[derive(Debug, Clone)]
pub struct RegistryRun {
    pub results: BTreeMap<AnalyzerKind, AgentAnalysis>,
    pub faults: Vec<AnalyzerFault>,
}

pub struct AnalyzerRegistry {
    analyzers: Vec<Box<dyn Analyzer>>,
    parallel: bool,
}

impl AnalyzerRegistry {
    /// The five standard analyzers in their fixed order.
    pub fn standard(discovery_delta: f64) -> Self {
        Self {
            analyzers: vec![
                Box::new(PatternDetector::new(discovery_delta)),
                Box::new(BehavioralAnalyzer::new(discovery_delta)),
                Box::new(VelocityChecker::new(discovery_delta)),
                Box::new(MerchantRiskAnalyzer::new(discovery_delta)),
                Box::new(GeographicAnalyzer::new(discovery_delta)),
            ],
            parallel: false,
        }
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Swap in a different implementation for one analyzer slot.
    pub fn replace(&mut self, analyzer: Box<dyn Analyzer>) {
        let kind = analyzer.kind();
        match self.analyzers.iter().position(|a| a.kind() == kind) {
            Some(idx) => self.analyzers[idx] = analyzer,
            None => self.analyzers.push(analyzer),
        }
        self.analyzers.sort_by_key(|a| a.kind());
    }

    pub fn analyzer(&self, kind: AnalyzerKind) -> Option<&dyn Analyzer> {
        self.analyzers.iter().find(|a| a.kind() == kind).map(|a| a.as_ref())
    }

    pub fn kinds(&self) -> Vec<AnalyzerKind> {
        self.analyzers.iter().map(|a| a.kind()).collect()
    }

    /// Run every analyzer against one playbook snapshot.
    pub fn run_all(&self, tx: &Transaction, playbook: &Playbook) -> RegistryRun {
        let outcomes: Vec<(AnalyzerKind, AceResult<AgentAnalysis>)> = if self.parallel {
            std::thread::scope(|scope| {
                let handles: Vec<_> = self
                    .analyzers
                    .iter()
                    .map(|analyzer| {
                        let kind = analyzer.kind();
                        (kind, scope.spawn(move || run_one(analyzer.as_ref(), tx, playbook)))
                    })
                    .collect();
                handles
                    .into_iter()
                    .map(|(kind, handle)| {
                        let outcome = handle.join().unwrap_or_else(|_| {
                            Err(AceError::Analyzer {
                                name: kind.as_str().to_string(),
                                reason: "analyzer thread panicked".to_string(),
                            })
                        });
                        (kind, outcome)
                    })
                    .collect()
            })
        } else {
            self.analyzers
                .iter()
                .map(|analyzer| (analyzer.kind(), run_one(analyzer.as_ref(), tx, playbook)))
                .collect()
        };

        let mut results = BTreeMap::new();
        let mut faults = Vec::new();
        for (kind, outcome) in outcomes {
            match outcome {
                Ok(mut analysis) => {
                    analysis.name = kind;
                    results.insert(kind, analysis);
                }
                Err(e) => {
                    log::warn!("analyzer {} degraded: {e}", kind.as_str());
                    let message = e.to_string();
                    results.insert(kind, AgentAnalysis::neutral(kind, &message));
                    faults.push(AnalyzerFault { analyzer: kind, message });
                }
            }
        }

        // Coverage: a registry missing a slot still reports every analyzer.
        for kind in AnalyzerKind::ALL {
            if !results.contains_key(&kind) {
                let message = format!("no analyzer registered for {}", kind.as_str());
                log::warn!("{message}");
                results.insert(kind, AgentAnalysis::neutral(kind, &message));
                faults.push(AnalyzerFault { analyzer: kind, message });
            }
        }

        RegistryRun { results, faults }
    }
}

fn run_one(analyzer: &dyn Analyzer, tx: &Transaction, playbook: &Playbook) -> AceResult<AgentAnalysis> {
    let kind = analyzer.kind();
    let bullets = playbook.active_for(kind);
    panic::catch_unwind(AssertUnwindSafe(|| analyzer.analyze(tx, &bullets))).unwrap_or_else(|_| {
        Err(AceError::Analyzer {
            name: kind.as_str().to_string(),
            reason: "analyzer panicked".to_string(),
        })
    })
}
