use crate::{
    aggregator::{validate_weights, DEFAULT_DECISION_THRESHOLD},
    analyzer::AnalyzerKind,
    error::{AceError, AceResult},
    playbook::{smoothed_rate, Bullet, Comparator, Feature, HeuristicRule, Playbook},
};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningConfig {
    /// Scored uses before a bullet may be retired.
    pub prune_min_uses: u32,
    /// Success rate under which a sufficiently used bullet is retired.
    pub prune_below: f64,
    /// Cap on active bullets per analyzer.
    pub max_bullets_per_node: usize,
    /// Risk points carried by a newly discovered heuristic.
    pub discovery_delta: f64,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            prune_min_uses: 5,
            prune_below: 0.35,
            max_bullets_per_node: 25,
            discovery_delta: 12.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct AceConfigFile {
    decision_threshold: f64,
    weights: BTreeMap<AnalyzerKind, f64>,
    #[serde(default)]
    learning: LearningConfig,
    #[serde(default)]
    parallel_analyzers: bool,
}

/// One pre-trained bullet as written in offline_playbook.json.
#[derive(Debug, Clone, Deserialize)]
struct SeedBullet {
    id: String,
    node: AnalyzerKind,
    rule: HeuristicRule,
    #[serde(default)]
    helpful_count: u32,
    #[serde(default)]
    harmful_count: u32,
    created_at: DateTime<Utc>,
}

impl From<SeedBullet> for Bullet {
    fn from(seed: SeedBullet) -> Self {
        Bullet {
            id: seed.id,
            content: seed.rule.describe(),
            node: seed.node,
            rule: seed.rule,
            helpful_count: seed.helpful_count,
            harmful_count: seed.harmful_count,
            success_rate: smoothed_rate(seed.helpful_count, seed.harmful_count),
            times_selected: seed.helpful_count + seed.harmful_count,
            created_at: seed.created_at,
            retired: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct OfflinePlaybookFile {
    bullets: Vec<SeedBullet>,
}

#[derive(Debug, Clone)]
pub struct AceConfig {
    pub decision_threshold: f64,
    pub weights: BTreeMap<AnalyzerKind, f64>,
    pub learning: LearningConfig,
    pub parallel_analyzers: bool,
    /// Frozen bullets for offline ACE; also the starting point of online ACE.
    pub offline_bullets: Vec<Bullet>,
}

impl AceConfig {
    /// Load from the data/ directory.
    /// In tests, use AceConfig::default_test().
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let path = format!("{data_dir}/config/ace_config.json");
        let content = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let file: AceConfigFile = serde_json::from_str(&content)?;

        let playbook_path = format!("{data_dir}/playbook/offline_playbook.json");
        let playbook_content = std::fs::read_to_string(&playbook_path)
            .map_err(|e| anyhow::anyhow!("Cannot read {playbook_path}: {e}"))?;
        let playbook_file: OfflinePlaybookFile = serde_json::from_str(&playbook_content)?;

        let config = Self {
            decision_threshold: file.decision_threshold,
            weights: file.weights,
            learning: file.learning,
            parallel_analyzers: file.parallel_analyzers,
            offline_bullets: playbook_file.bullets.into_iter().map(Bullet::from).collect(),
        };
        config.validate()?;
        log::info!(
            "loaded config from {data_dir}: threshold={} offline bullets={}",
            config.decision_threshold,
            config.offline_bullets.len()
        );
        Ok(config)
    }

    pub fn validate(&self) -> AceResult<()> {
        validate_weights(&self.weights)?;
        if !(0.0..=100.0).contains(&self.decision_threshold) {
            return Err(AceError::InvalidConfig(format!(
                "decision_threshold {} outside 0-100",
                self.decision_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.learning.prune_below) {
            return Err(AceError::InvalidConfig("learning.prune_below must be within 0-1".into()));
        }
        if self.learning.discovery_delta <= 0.0 {
            return Err(AceError::InvalidConfig("learning.discovery_delta must be positive".into()));
        }
        Ok(())
    }

    pub fn offline_playbook(&self) -> Playbook {
        Playbook::from_bullets(self.offline_bullets.clone())
    }

    /// Config with hardcoded defaults for use in unit tests.
    pub fn default_test() -> Self {
        Self {
            decision_threshold: DEFAULT_DECISION_THRESHOLD,
            weights: AnalyzerKind::ALL.iter().map(|k| (*k, k.default_weight())).collect(),
            learning: LearningConfig::default(),
            parallel_analyzers: false,
            offline_bullets: default_offline_bullets(),
        }
    }
}

/// The pre-trained playbook shipped in data/playbook/offline_playbook.json.
pub fn default_offline_bullets() -> Vec<Bullet> {
    use AnalyzerKind::*;
    use Comparator::*;
    use Feature::*;

    let created_at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).single().unwrap_or_default();
    let seeds = [
        ("pat-00001", PatternDetector, Amount, AtLeast, 5_000.0, 10.0, 18, 4),
        ("pat-00002", PatternDetector, Amount, AtMost, 200.0, -8.0, 25, 3),
        ("beh-00001", BehavioralAnalyzer, AccountAgeDays, AtMost, 14.0, 12.0, 20, 3),
        ("beh-00002", BehavioralAnalyzer, TotalTransactions, AtLeast, 100.0, -10.0, 30, 2),
        ("vel-00001", VelocityChecker, TotalTransactions, AtMost, 0.0, 10.0, 12, 4),
        ("vel-00002", VelocityChecker, DailyVelocity, AtLeast, 8.0, 12.0, 9, 3),
        ("mer-00001", MerchantRiskAnalyzer, MerchantFraudReports, AtLeast, 10.0, 15.0, 22, 2),
        ("mer-00002", MerchantRiskAnalyzer, MerchantRating, AtLeast, 4.5, -10.0, 27, 3),
        ("geo-00001", GeographicAnalyzer, LocationChanged, AtLeast, 1.0, 10.0, 15, 6),
        ("geo-00002", GeographicAnalyzer, HourOfDay, AtMost, 4.0, 8.0, 8, 4),
    ];

    seeds
        .into_iter()
        .map(|(id, node, feature, comparator, threshold, delta, helpful, harmful)| {
            Bullet::from(SeedBullet {
                id: id.to_string(),
                node,
                rule: HeuristicRule::new(feature, comparator, threshold, delta),
                helpful_count: helpful,
                harmful_count: harmful,
                created_at,
            })
        })
        .collect()
}
