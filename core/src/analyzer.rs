//! Analyzer trait and shared scoring helpers.
//!
//! RULE: Analyzers are pure. Output depends only on the transaction and
//! the bullets passed in; no analyzer keeps state between calls.

use crate::{
    analysis::{AgentAnalysis, Decision},
    error::AceResult,
    playbook::{Bullet, HeuristicRule},
    transaction::Transaction,
};
use serde::{Deserialize, Serialize};

/// Score above which an analyzer recommends DECLINE on its own.
pub const LOCAL_DECLINE_THRESHOLD: f64 = 50.0;

/// Confidence bonus per matched bullet, scaled by its success rate.
const BULLET_CONFIDENCE_STEP: f64 = 0.04;
const MAX_BULLET_CONFIDENCE_BONUS: f64 = 0.20;

/// The five fixed analyzer identities.
/// Declaration order is the registry order and the map key order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AnalyzerKind {
    PatternDetector,
    BehavioralAnalyzer,
    VelocityChecker,
    MerchantRiskAnalyzer,
    GeographicAnalyzer,
}

impl AnalyzerKind {
    pub const ALL: [AnalyzerKind; 5] = [
        AnalyzerKind::PatternDetector,
        AnalyzerKind::BehavioralAnalyzer,
        AnalyzerKind::VelocityChecker,
        AnalyzerKind::MerchantRiskAnalyzer,
        AnalyzerKind::GeographicAnalyzer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PatternDetector => "PatternDetector",
            Self::BehavioralAnalyzer => "BehavioralAnalyzer",
            Self::VelocityChecker => "VelocityChecker",
            Self::MerchantRiskAnalyzer => "MerchantRiskAnalyzer",
            Self::GeographicAnalyzer => "GeographicAnalyzer",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.as_str() == s)
    }

    /// Prefix for bullet ids owned by this analyzer.
    pub fn id_prefix(&self) -> &'static str {
        match self {
            Self::PatternDetector => "pat",
            Self::BehavioralAnalyzer => "beh",
            Self::VelocityChecker => "vel",
            Self::MerchantRiskAnalyzer => "mer",
            Self::GeographicAnalyzer => "geo",
        }
    }

    /// Default contribution weight in the aggregate score.
    pub fn default_weight(&self) -> f64 {
        match self {
            Self::PatternDetector => 0.20,
            Self::BehavioralAnalyzer => 0.22,
            Self::VelocityChecker => 0.20,
            Self::MerchantRiskAnalyzer => 0.18,
            Self::GeographicAnalyzer => 0.20,
        }
    }
}

/// The contract every analyzer must fulfill.
pub trait Analyzer: Send + Sync {
    fn kind(&self) -> AnalyzerKind;

    /// Score one transaction. `bullets` are this analyzer's active
    /// playbook entries (empty in vanilla mode).
    fn analyze(&self, tx: &Transaction, bullets: &[&Bullet]) -> AceResult<AgentAnalysis>;

    /// Suggest a new heuristic after this analyzer got `tx` wrong.
    fn propose_heuristic(&self, tx: &Transaction, is_fraud: bool) -> Option<HeuristicRule>;
}

/// Working state of one analyzer's base assessment.
#[derive(Debug, Clone)]
pub struct Assessment {
    score: f64,
    findings: Vec<String>,
}

impl Assessment {
    pub fn new(base_score: f64) -> Self {
        Self { score: base_score, findings: Vec::new() }
    }

    /// Add risk points together with the finding that justifies them.
    pub fn add(&mut self, points: f64, finding: impl Into<String>) {
        self.score += points;
        self.findings.push(finding.into());
    }

    /// Record a finding without moving the score.
    pub fn note(&mut self, finding: impl Into<String>) {
        self.findings.push(finding.into());
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    /// Apply matching bullets and produce the analyzer output.
    ///
    /// Base confidence grows with the distance of the pre-playbook score
    /// from the decision boundary. Matching bullets only ever add
    /// confidence, scaled by their success rate.
    pub fn finish(
        mut self,
        kind: AnalyzerKind,
        tx: &Transaction,
        bullets: &[&Bullet],
        base_confidence: f64,
    ) -> AgentAnalysis {
        let base_score = self.score.clamp(0.0, 100.0);
        let margin = (base_score - LOCAL_DECLINE_THRESHOLD).abs() / LOCAL_DECLINE_THRESHOLD;
        let mut confidence = base_confidence + 0.25 * margin;

        let mut score = base_score;
        let mut bonus = 0.0;
        let mut applied = Vec::new();
        for bullet in bullets.iter().filter(|b| b.node == kind && b.rule.matches(tx)) {
            score += bullet.rule.risk_delta * bullet.success_rate;
            bonus += BULLET_CONFIDENCE_STEP * bullet.success_rate;
            self.findings.push(format!("Playbook: {}", bullet.content));
            applied.push(bullet.id.clone());
        }
        confidence += bonus.min(MAX_BULLET_CONFIDENCE_BONUS);

        let risk_score = score.clamp(0.0, 100.0);
        let recommendation = Decision::from_score(risk_score, LOCAL_DECLINE_THRESHOLD);
        let reasoning = if applied.is_empty() {
            format!(
                "{} scored {risk_score:.1}/100 from {} signal(s)",
                kind.as_str(),
                self.findings.len()
            )
        } else {
            format!(
                "{} scored {risk_score:.1}/100 (base {base_score:.1}, {} playbook bullet(s) applied)",
                kind.as_str(),
                applied.len()
            )
        };

        AgentAnalysis {
            name: kind,
            risk_score,
            findings: self.findings,
            recommendation,
            confidence: confidence.clamp(0.0, 1.0),
            reasoning,
            applied_bullets: applied,
            degraded: false,
        }
    }
}

/// Round `v` down to a multiple of `step`.
pub(crate) fn floor_to(v: f64, step: f64) -> f64 {
    (v / step).floor() * step
}

/// Round `v` up to a multiple of `step`.
pub(crate) fn ceil_to(v: f64, step: f64) -> f64 {
    (v / step).ceil() * step
}
