//! Online ACE learning — turns labeled outcomes into playbook changes.
//!
//! One feedback step, published through a single PlaybookStore swap:
//!   1. Score every bullet the analyzers applied: helpful when the sign
//!      of its risk delta agrees with the ground truth, harmful otherwise.
//!   2. Retire bullets that have enough uses and a low success rate.
//!      Retired bullets stay in the playbook; analyzers just skip them.
//!   3. If the final decision was wrong, let every analyzer that was also
//!      wrong propose a heuristic, and append it unless an active bullet
//!      already tests the same condition or the analyzer is at its cap.
//!
//! The step is deterministic: same playbook + same input = same output.

use crate::{
    analysis::FraudAnalysisResult,
    config::LearningConfig,
    error::{AceError, AceResult},
    event::PlaybookEvent,
    playbook::{Playbook, PlaybookStore},
    registry::AnalyzerRegistry,
    types::PlaybookVersion,
};
use chrono::{DateTime, Utc};

/// Attempts before giving up on a contended commit.
const MAX_COMMIT_ATTEMPTS: usize = 4;

#[derive(Debug, Clone)]
pub struct LearningOutcome {
    pub version: PlaybookVersion,
    pub events: Vec<PlaybookEvent>,
}

#[derive(Debug, Clone)]
pub struct Learner {
    config: LearningConfig,
}

impl Learner {
    pub fn new(config: LearningConfig) -> Self {
        Self { config }
    }

    /// Apply one feedback step to `playbook` in place.
    pub fn apply(
        &self,
        playbook: &mut Playbook,
        registry: &AnalyzerRegistry,
        result: &FraudAnalysisResult,
        is_fraud: bool,
        now: DateTime<Utc>,
    ) -> Vec<PlaybookEvent> {
        let mut events = Vec::new();

        for analysis in result.analyzer_results.values() {
            for bullet_id in &analysis.applied_bullets {
                let Some(bullet) = playbook.get_mut(bullet_id) else {
                    continue;
                };
                if bullet.retired {
                    continue;
                }
                let helpful = bullet.rule.indicates_fraud() == is_fraud;
                bullet.record_outcome(helpful);
                events.push(PlaybookEvent::BulletScored {
                    bullet_id: bullet.id.clone(),
                    node: bullet.node,
                    helpful,
                    success_rate: bullet.success_rate,
                });

                if bullet.uses() >= self.config.prune_min_uses
                    && bullet.success_rate < self.config.prune_below
                {
                    bullet.retired = true;
                    log::info!(
                        "retired bullet {} ({}) at success rate {:.2}",
                        bullet.id,
                        bullet.node.as_str(),
                        bullet.success_rate
                    );
                    events.push(PlaybookEvent::BulletRetired {
                        bullet_id: bullet.id.clone(),
                        node: bullet.node,
                        success_rate: bullet.success_rate,
                    });
                }
            }
        }

        if result.is_correct(is_fraud) {
            return events;
        }

        for (kind, analysis) in &result.analyzer_results {
            if analysis.degraded || analysis.recommendation.is_fraud() == is_fraud {
                continue;
            }
            if playbook.active_for(*kind).len() >= self.config.max_bullets_per_node {
                log::debug!("{} playbook full; skipping discovery", kind.as_str());
                continue;
            }
            let Some(rule) = registry
                .analyzer(*kind)
                .and_then(|a| a.propose_heuristic(&result.transaction, is_fraud))
            else {
                continue;
            };
            if playbook.has_active_rule(*kind, &rule) {
                continue;
            }
            let bullet_id = playbook.add_bullet(*kind, rule, now);
            let content = playbook
                .get(&bullet_id)
                .map(|b| b.content.clone())
                .unwrap_or_default();
            events.push(PlaybookEvent::BulletAdded { bullet_id, node: *kind, content });
        }

        events
    }

    /// Apply one feedback step to the live store.
    ///
    /// The step runs on a copy of the current snapshot. When it changes
    /// nothing the store is left alone and the version does not move.
    /// Otherwise `persist` receives the new playbook and its events
    /// before the playbook is published; a persist error aborts the step.
    ///
    /// The step only refers to bullets by id and to the analyzed
    /// transaction, so on a version conflict it is recomputed against
    /// the newer playbook.
    pub fn commit<P>(
        &self,
        store: &PlaybookStore,
        registry: &AnalyzerRegistry,
        result: &FraudAnalysisResult,
        is_fraud: bool,
        mut persist: P,
    ) -> AceResult<LearningOutcome>
    where
        P: FnMut(&Playbook, &[PlaybookEvent]) -> AceResult<()>,
    {
        let now = Utc::now();
        let mut last_err = None;
        for _ in 0..MAX_COMMIT_ATTEMPTS {
            let current = store.snapshot()?;
            let mut next = Playbook::clone(&current);
            let events = self.apply(&mut next, registry, result, is_fraud, now);
            if events.is_empty() {
                log::debug!("analysis {} left playbook v{} unchanged", result.analysis_id, current.version);
                return Ok(LearningOutcome { version: current.version, events });
            }
            match store.publish(current.version, next, |pb| persist(pb, &events)) {
                Ok(version) => {
                    log::info!(
                        "playbook v{version}: {} event(s) from analysis {}",
                        events.len(),
                        result.analysis_id
                    );
                    return Ok(LearningOutcome { version, events });
                }
                Err(e @ AceError::PlaybookConflict { .. }) => {
                    log::debug!("learning commit retry: {e}");
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("learning commit failed").into()))
    }
}
