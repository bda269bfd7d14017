//! Aggregator — reconciles per-analyzer outputs into one decision.
//!
//! risk_score  = Σ w_i · score_i
//! confidence  = Σ w_i · conf_i + AGREEMENT_BONUS · (weighted share of
//!               healthy analyzers whose recommendation matches the decision)
//! decision    = DECLINE iff risk_score > threshold
//!
//! Degraded analyzers get weight 0 and the rest are renormalized, so the
//! contributions always sum to 1.

use crate::{
    analysis::{AgentAnalysis, Decision, Mode, RiskBreakdown},
    analyzer::AnalyzerKind,
    error::{AceError, AceResult},
};
use std::collections::BTreeMap;

pub const DEFAULT_DECISION_THRESHOLD: f64 = 50.0;
const AGREEMENT_BONUS: f64 = 0.05;
const WEIGHT_TOLERANCE: f64 = 1e-6;
const TOP_FINDINGS: usize = 3;

#[derive(Debug, Clone)]
pub struct Aggregate {
    pub risk_score: f64,
    pub confidence: f64,
    pub decision: Decision,
    pub reasoning: String,
    pub breakdown: BTreeMap<AnalyzerKind, RiskBreakdown>,
}

#[derive(Debug, Clone)]
pub struct Aggregator {
    weights: BTreeMap<AnalyzerKind, f64>,
    threshold: f64,
}

impl Default for Aggregator {
    fn default() -> Self {
        let weights = AnalyzerKind::ALL.iter().map(|k| (*k, k.default_weight())).collect();
        Self { weights, threshold: DEFAULT_DECISION_THRESHOLD }
    }
}

impl Aggregator {
    /// Weights must cover all five analyzers, be non-negative and sum to 1.
    pub fn new(weights: BTreeMap<AnalyzerKind, f64>, threshold: f64) -> AceResult<Self> {
        validate_weights(&weights)?;
        if !(0.0..=100.0).contains(&threshold) {
            return Err(AceError::InvalidConfig(format!(
                "decision threshold {threshold} outside 0-100"
            )));
        }
        Ok(Self { weights, threshold })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn weight(&self, kind: AnalyzerKind) -> f64 {
        self.weights.get(&kind).copied().unwrap_or(0.0)
    }

    /// Effective contribution weights for this set of results.
    pub fn contributions(&self, results: &BTreeMap<AnalyzerKind, AgentAnalysis>) -> BTreeMap<AnalyzerKind, f64> {
        let healthy: f64 = results
            .iter()
            .filter(|(_, a)| !a.degraded)
            .map(|(k, _)| self.weight(*k))
            .sum();

        results
            .iter()
            .map(|(kind, analysis)| {
                let w = if healthy <= 0.0 {
                    // Everything degraded: fall back to the base weights.
                    self.weight(*kind)
                } else if analysis.degraded {
                    0.0
                } else {
                    self.weight(*kind) / healthy
                };
                (*kind, w)
            })
            .collect()
    }

    pub fn aggregate(&self, results: &BTreeMap<AnalyzerKind, AgentAnalysis>, mode: Mode) -> Aggregate {
        let contributions = self.contributions(results);

        let risk_score: f64 = results
            .iter()
            .map(|(k, a)| contributions[k] * a.risk_score)
            .sum::<f64>()
            .clamp(0.0, 100.0);
        let decision = Decision::from_score(risk_score, self.threshold);

        let mean_confidence: f64 = results.iter().map(|(k, a)| contributions[k] * a.confidence).sum();
        let agreement: f64 = results
            .iter()
            .filter(|(_, a)| !a.degraded && a.recommendation == decision)
            .map(|(k, _)| contributions[k])
            .sum();
        let confidence = (mean_confidence + AGREEMENT_BONUS * agreement).clamp(0.0, 1.0);

        let breakdown = results
            .iter()
            .map(|(k, a)| {
                (
                    *k,
                    RiskBreakdown {
                        score: a.risk_score,
                        contribution: contributions[k],
                        findings_count: a.findings.len(),
                    },
                )
            })
            .collect();

        let reasoning = self.explain(results, &contributions, decision, risk_score, mode);

        log::debug!(
            "aggregate mode={} risk={risk_score:.2} decision={} confidence={confidence:.3}",
            mode.as_str(),
            decision.as_str()
        );

        Aggregate { risk_score, confidence, decision, reasoning, breakdown }
    }

    /// Synthesize reasoning from the highest-contributing analyzers.
    fn explain(
        &self,
        results: &BTreeMap<AnalyzerKind, AgentAnalysis>,
        contributions: &BTreeMap<AnalyzerKind, f64>,
        decision: Decision,
        risk_score: f64,
        mode: Mode,
    ) -> String {
        let mut ranked: Vec<(&AnalyzerKind, &AgentAnalysis)> =
            results.iter().filter(|(_, a)| !a.degraded).collect();
        // DECLINE leads with the riskiest signals, APPROVE with the safest.
        ranked.sort_by(|(ka, a), (kb, b)| {
            let wa = contributions[*ka] * a.risk_score;
            let wb = contributions[*kb] * b.risk_score;
            let ord = match decision {
                Decision::Decline => wb.total_cmp(&wa),
                Decision::Approve => wa.total_cmp(&wb),
            };
            ord.then(ka.cmp(kb))
        });

        let signals: Vec<String> = ranked
            .iter()
            .filter_map(|(k, a)| a.findings.first().map(|f| format!("{}: {f}", k.as_str())))
            .take(TOP_FINDINGS)
            .collect();

        let mut text = format!(
            "{} (risk {risk_score:.1}/100, {})",
            decision.as_str(),
            mode.label()
        );
        if signals.is_empty() {
            text.push_str(": no analyzer produced findings");
        } else {
            text.push_str(": ");
            text.push_str(&signals.join("; "));
        }

        let dissent: Vec<&str> = results
            .iter()
            .filter(|(_, a)| !a.degraded && a.recommendation != decision)
            .map(|(k, _)| k.as_str())
            .collect();
        if !dissent.is_empty() {
            text.push_str(&format!(". Dissenting: {}", dissent.join(", ")));
        }
        text
    }
}

pub fn validate_weights(weights: &BTreeMap<AnalyzerKind, f64>) -> AceResult<()> {
    for kind in AnalyzerKind::ALL {
        match weights.get(&kind) {
            Some(w) if w.is_finite() && *w >= 0.0 => {}
            Some(w) => {
                return Err(AceError::InvalidConfig(format!(
                    "weight for {} must be non-negative, got {w}",
                    kind.as_str()
                )))
            }
            None => {
                return Err(AceError::InvalidConfig(format!(
                    "missing weight for {}",
                    kind.as_str()
                )))
            }
        }
    }
    let total: f64 = weights.values().sum();
    if (total - 1.0).abs() > WEIGHT_TOLERANCE {
        return Err(AceError::InvalidConfig(format!("weights sum to {total}, expected 1.0")));
    }
    Ok(())
}
