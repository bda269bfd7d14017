//! The fraud engine — owns the pipeline, both playbooks and the store.
//!
//! PLAYBOOKS:
//!   - offline: frozen at construction, shared read-only by every
//!     offline ACE analysis.
//!   - live:    the online ACE store. Each analysis reads one snapshot;
//!     feedback commits through the store's compare-and-swap step.
//!
//! Every analysis is persisted so single analyzer outputs can be fetched
//! later by id, and so ground truth can arrive after the decision.

use crate::{
    aggregator::Aggregator,
    analysis::{AgentAnalysis, FraudAnalysisResult, Mode},
    analyzer::AnalyzerKind,
    config::AceConfig,
    error::{AceError, AceResult},
    event::EventLogEntry,
    experiment::{ExperimentConfig, ExperimentResult, ExperimentRunner},
    learning::{Learner, LearningOutcome},
    pipeline::Pipeline,
    playbook::{Bullet, Playbook, PlaybookStore},
    registry::AnalyzerRegistry,
    store::AnalysisStore,
    transaction::Transaction,
    types::PlaybookVersion,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// The live playbook as exposed to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybookView {
    pub version: PlaybookVersion,
    pub total_bullets: usize,
    pub active_bullets: usize,
    pub nodes: BTreeMap<AnalyzerKind, Vec<Bullet>>,
}

impl PlaybookView {
    pub fn from_playbook(playbook: &Playbook) -> Self {
        Self {
            version: playbook.version,
            total_bullets: playbook.len(),
            active_bullets: playbook.active_len(),
            nodes: playbook.grouped(),
        }
    }
}

pub struct FraudEngine {
    pub config: AceConfig,
    pipeline: Pipeline,
    learner: Learner,
    offline: Arc<Playbook>,
    live: PlaybookStore,
    pub store: AnalysisStore,
}

impl FraudEngine {
    /// Wire an engine from config. The live playbook is restored from
    /// the store when one was saved, else it starts as the offline one.
    pub fn new(config: AceConfig, store: AnalysisStore) -> AceResult<Self> {
        config.validate()?;
        let registry = AnalyzerRegistry::standard(config.learning.discovery_delta)
            .with_parallel(config.parallel_analyzers);
        let aggregator = Aggregator::new(config.weights.clone(), config.decision_threshold)?;
        let offline = Arc::new(config.offline_playbook());

        let live = match store.load_playbook()? {
            Some(saved) => {
                log::info!("restored live playbook v{} ({} bullets)", saved.version, saved.len());
                saved
            }
            None => Playbook::clone(&offline),
        };

        Ok(Self {
            learner: Learner::new(config.learning.clone()),
            pipeline: Pipeline::new(registry, aggregator),
            offline,
            live: PlaybookStore::new(live),
            store,
            config,
        })
    }

    /// Fully wired engine over an in-memory store with test defaults.
    pub fn build_test() -> AceResult<Self> {
        let store = AnalysisStore::in_memory()?;
        store.migrate()?;
        Self::new(AceConfig::default_test(), store)
    }

    /// Swap one analyzer implementation (used to inject failures in tests).
    pub fn replace_analyzer(&mut self, analyzer: Box<dyn crate::analyzer::Analyzer>) {
        self.pipeline.registry.replace(analyzer);
    }

    pub fn offline_playbook(&self) -> &Playbook {
        &self.offline
    }

    /// Score one transaction under `mode` and persist the result.
    pub fn analyze(&self, tx: &Transaction, mode: Mode) -> AceResult<FraudAnalysisResult> {
        let result = match mode {
            Mode::Vanilla => self.pipeline.score(tx, mode, &Playbook::empty()),
            Mode::OfflineAce => self.pipeline.score(tx, mode, &self.offline),
            Mode::OnlineAce => {
                let snapshot = self.live.snapshot()?;
                self.pipeline.score(tx, mode, &snapshot)
            }
        };
        self.store.save_analysis(&result)?;
        Ok(result)
    }

    /// Parse, validate and score a JSON transaction.
    pub fn analyze_json(&self, json: &str, mode: Mode) -> AceResult<FraudAnalysisResult> {
        let tx = Transaction::from_json(json)?;
        self.analyze(&tx, mode)
    }

    /// Score one transaction under each of `modes`, in the order given.
    pub fn compare(&self, tx: &Transaction, modes: &[Mode]) -> AceResult<Vec<FraudAnalysisResult>> {
        if modes.is_empty() {
            return Err(AceError::NoModesSelected);
        }
        modes.iter().map(|&mode| self.analyze(tx, mode)).collect()
    }

    /// Record ground truth for a stored analysis. Only online ACE results
    /// update the live playbook; other modes are recorded and left alone.
    ///
    /// A learned playbook becomes visible only after the feedback row,
    /// its events and the playbook row are committed together.
    pub fn submit_feedback(&self, analysis_id: &str, is_fraud: bool) -> AceResult<LearningOutcome> {
        let result = self
            .store
            .load_analysis(analysis_id)?
            .ok_or_else(|| AceError::NotFound { kind: "analysis", id: analysis_id.to_string() })?;
        if self.store.has_feedback(analysis_id)? {
            return Err(AceError::DuplicateFeedback { analysis_id: analysis_id.to_string() });
        }

        if result.mode != Mode::OnlineAce {
            let version = self.live.version()?;
            self.store.record_feedback(analysis_id, is_fraud, version)?;
            return Ok(LearningOutcome { version, events: Vec::new() });
        }

        let outcome = self.learner.commit(
            &self.live,
            &self.pipeline.registry,
            &result,
            is_fraud,
            |playbook, events| {
                let entries = events
                    .iter()
                    .map(|event| -> AceResult<EventLogEntry> {
                        Ok(EventLogEntry {
                            id: None,
                            playbook_version: playbook.version,
                            analysis_id: Some(analysis_id.to_string()),
                            event_type: event.type_name().to_string(),
                            payload: serde_json::to_string(event)?,
                        })
                    })
                    .collect::<AceResult<Vec<_>>>()?;
                self.store.record_learning(analysis_id, is_fraud, playbook, &entries)
            },
        )?;
        if outcome.events.is_empty() {
            self.store.record_feedback(analysis_id, is_fraud, outcome.version)?;
        }
        Ok(outcome)
    }

    /// Replay a labeled dataset under each requested mode and persist
    /// the runs. Experiments never touch the live playbook.
    pub fn run_experiment(&self, config: &ExperimentConfig) -> AceResult<Vec<ExperimentResult>> {
        let runner = ExperimentRunner::new(&self.pipeline, &self.learner, &self.offline);
        let results = runner.run_comparison(config)?;
        for result in &results {
            self.store.save_experiment(result)?;
        }
        Ok(results)
    }

    pub fn playbook(&self) -> AceResult<PlaybookView> {
        let snapshot = self.live.snapshot()?;
        Ok(PlaybookView::from_playbook(&snapshot))
    }

    pub fn playbook_version(&self) -> AceResult<PlaybookVersion> {
        self.live.version()
    }

    /// Fetch one analyzer's stored output by `<analysis_id>/<AnalyzerName>`.
    pub fn agent_analysis(&self, id: &str) -> AceResult<AgentAnalysis> {
        self.store
            .load_agent_analysis(id)?
            .ok_or_else(|| AceError::NotFound { kind: "agent analysis", id: id.to_string() })
    }

    pub fn analysis(&self, analysis_id: &str) -> AceResult<FraudAnalysisResult> {
        self.store
            .load_analysis(analysis_id)?
            .ok_or_else(|| AceError::NotFound { kind: "analysis", id: analysis_id.to_string() })
    }
}
