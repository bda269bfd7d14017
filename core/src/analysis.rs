//! Analysis outputs: per-analyzer results and the aggregated decision.

use crate::{
    analyzer::AnalyzerKind,
    transaction::Transaction,
    types::{AnalysisId, BulletId, PlaybookVersion},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Decision {
    Approve,
    Decline,
}

impl Decision {
    /// DECLINE iff the score is strictly above the threshold.
    pub fn from_score(risk_score: f64, threshold: f64) -> Self {
        if risk_score > threshold {
            Self::Decline
        } else {
            Self::Approve
        }
    }

    pub fn is_fraud(&self) -> bool {
        matches!(self, Self::Decline)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "APPROVE",
            Self::Decline => "DECLINE",
        }
    }
}

/// Which playbook, if any, the analyzers consult.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// No heuristics.
    Vanilla,
    /// Frozen pre-trained playbook.
    OfflineAce,
    /// Live playbook, updated from feedback.
    OnlineAce,
}

impl Mode {
    pub const ALL: [Mode; 3] = [Mode::Vanilla, Mode::OfflineAce, Mode::OnlineAce];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vanilla => "vanilla",
            Self::OfflineAce => "offline_ace",
            Self::OnlineAce => "online_ace",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Vanilla => "VANILLA",
            Self::OfflineAce => "OFFLINE ACE",
            Self::OnlineAce => "ONLINE ACE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "vanilla" => Some(Self::Vanilla),
            "offline_ace" => Some(Self::OfflineAce),
            "online_ace" => Some(Self::OnlineAce),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentAnalysis {
    pub name: AnalyzerKind,
    pub risk_score: f64,
    pub findings: Vec<String>,
    pub recommendation: Decision,
    pub confidence: f64,
    pub reasoning: String,
    #[serde(default)]
    pub applied_bullets: Vec<BulletId>,
    #[serde(default)]
    pub degraded: bool,
}

impl AgentAnalysis {
    /// Stand-in for an analyzer that failed: neutral score, zero confidence.
    pub fn neutral(name: AnalyzerKind, reason: &str) -> Self {
        Self {
            name,
            risk_score: 50.0,
            findings: vec![format!("Analyzer unavailable: {reason}")],
            recommendation: Decision::Approve,
            confidence: 0.0,
            reasoning: format!("{} degraded; contribution withheld", name.as_str()),
            applied_bullets: Vec::new(),
            degraded: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskBreakdown {
    pub score: f64,
    pub contribution: f64,
    pub findings_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalyzerFault {
    pub analyzer: AnalyzerKind,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FraudAnalysisResult {
    pub analysis_id: AnalysisId,
    pub mode: Mode,
    pub playbook_version: PlaybookVersion,
    pub transaction: Transaction,
    pub decision: Decision,
    pub confidence: f64,
    pub risk_score: f64,
    pub reasoning: String,
    pub analyzer_results: BTreeMap<AnalyzerKind, AgentAnalysis>,
    pub risk_breakdown: BTreeMap<AnalyzerKind, RiskBreakdown>,
    #[serde(default)]
    pub analyzer_errors: Vec<AnalyzerFault>,
    pub timestamp: DateTime<Utc>,
}

impl FraudAnalysisResult {
    /// Identifier under which one analyzer's output is stored.
    pub fn agent_analysis_id(&self, kind: AnalyzerKind) -> String {
        agent_analysis_id(&self.analysis_id, kind)
    }

    pub fn is_correct(&self, is_fraud: bool) -> bool {
        self.decision.is_fraud() == is_fraud
    }
}

pub fn agent_analysis_id(analysis_id: &str, kind: AnalyzerKind) -> String {
    format!("{analysis_id}/{}", kind.as_str())
}
