//! Experiment runner — replays a labeled dataset under one or more modes.
//!
//! RULES:
//!   - Items are processed strictly in input order, one at a time.
//!   - In online ACE the learning commit for item i finishes before
//!     item i+1 is scored.
//!   - Each online run learns on a private store seeded from the offline
//!     playbook, so a replay of the same dataset is reproducible.

use crate::{
    analysis::Mode,
    dataset::LabeledTransaction,
    error::{AceError, AceResult},
    learning::Learner,
    pipeline::Pipeline,
    playbook::{Playbook, PlaybookStore},
};
use serde::{Deserialize, Serialize};
use std::time::Instant;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IterationMetric {
    /// 1-based position in the dataset.
    pub iteration: usize,
    /// Cumulative accuracy up to and including this item.
    pub accuracy: f64,
    pub playbook_size: usize,
    pub is_correct: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentResult {
    pub mode: Mode,
    pub problems_processed: usize,
    pub final_accuracy: f64,
    pub iteration_metrics: Vec<IterationMetric>,
    pub playbook_size: usize,
    /// Wall-clock seconds.
    pub execution_time: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub modes: Vec<Mode>,
    pub dataset: Vec<LabeledTransaction>,
}

impl ExperimentConfig {
    pub fn validate(&self) -> AceResult<()> {
        if self.modes.is_empty() {
            return Err(AceError::NoModesSelected);
        }
        if self.dataset.is_empty() {
            return Err(AceError::EmptyDataset);
        }
        Ok(())
    }
}

pub struct ExperimentRunner<'a> {
    pipeline: &'a Pipeline,
    learner: &'a Learner,
    offline: &'a Playbook,
}

impl<'a> ExperimentRunner<'a> {
    pub fn new(pipeline: &'a Pipeline, learner: &'a Learner, offline: &'a Playbook) -> Self {
        Self { pipeline, learner, offline }
    }

    /// Run every requested mode, in the order given.
    pub fn run_comparison(&self, config: &ExperimentConfig) -> AceResult<Vec<ExperimentResult>> {
        config.validate()?;
        config
            .modes
            .iter()
            .map(|mode| self.run(*mode, &config.dataset))
            .collect()
    }

    pub fn run(&self, mode: Mode, dataset: &[LabeledTransaction]) -> AceResult<ExperimentResult> {
        if dataset.is_empty() {
            return Err(AceError::EmptyDataset);
        }
        let started = Instant::now();

        let store = match mode {
            Mode::Vanilla => PlaybookStore::new(Playbook::empty()),
            Mode::OfflineAce | Mode::OnlineAce => PlaybookStore::new(self.offline.clone()),
        };

        let mut correct = 0usize;
        let mut metrics = Vec::with_capacity(dataset.len());

        for (idx, item) in dataset.iter().enumerate() {
            let snapshot = store.snapshot()?;
            let result = self.pipeline.score(&item.transaction, mode, &snapshot);
            let is_correct = result.is_correct(item.is_fraud);
            if is_correct {
                correct += 1;
            }

            if mode == Mode::OnlineAce {
                self.learner.commit(
                    &store,
                    &self.pipeline.registry,
                    &result,
                    item.is_fraud,
                    |_, _| Ok(()),
                )?;
            }

            let playbook_size = match mode {
                Mode::Vanilla => 0,
                _ => store.snapshot()?.active_len(),
            };
            metrics.push(IterationMetric {
                iteration: idx + 1,
                accuracy: correct as f64 / (idx + 1) as f64,
                playbook_size,
                is_correct,
            });
        }

        let final_accuracy = correct as f64 / dataset.len() as f64;
        let playbook_size = metrics.last().map(|m| m.playbook_size).unwrap_or(0);
        let execution_time = started.elapsed().as_secs_f64();

        log::info!(
            "experiment mode={} items={} accuracy={final_accuracy:.3} playbook={playbook_size} in {execution_time:.3}s",
            mode.as_str(),
            dataset.len()
        );

        Ok(ExperimentResult {
            mode,
            problems_processed: dataset.len(),
            final_accuracy,
            iteration_metrics: metrics,
            playbook_size,
            execution_time,
        })
    }
}
