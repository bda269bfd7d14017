//! Same inputs must give the same outputs.
//!
//! Vanilla and offline ACE are pure functions of the transaction.
//! Online ACE replays are reproducible given the same starting playbook
//! and the same labeled sequence.

use acefraud_core::{
    analysis::Mode,
    dataset::SyntheticDataset,
    engine::FraudEngine,
    experiment::{ExperimentConfig, ExperimentResult},
    transaction::Transaction,
};

const SKETCHY: &str = include_str!("../../data/samples/sketchy_transaction.json");

fn run(seed: u64, n: usize) -> Vec<ExperimentResult> {
    let engine = FraudEngine::build_test().expect("engine");
    engine
        .run_experiment(&ExperimentConfig {
            modes: Mode::ALL.to_vec(),
            dataset: SyntheticDataset::generate(seed, n, 0.3),
        })
        .expect("experiment")
}

#[test]
fn frozen_modes_repeat_exactly() {
    let engine = FraudEngine::build_test().unwrap();
    let tx = Transaction::from_json(SKETCHY).unwrap();

    for mode in [Mode::Vanilla, Mode::OfflineAce] {
        let a = engine.analyze(&tx, mode).unwrap();
        let b = engine.analyze(&tx, mode).unwrap();
        assert_ne!(a.analysis_id, b.analysis_id);
        assert_eq!(a.decision, b.decision);
        assert_eq!(a.risk_score, b.risk_score);
        assert_eq!(a.confidence, b.confidence);
        assert_eq!(a.reasoning, b.reasoning);
        assert_eq!(a.analyzer_results, b.analyzer_results);
    }
}

#[test]
fn synthetic_dataset_is_seeded() {
    let a = SyntheticDataset::generate(1234, 100, 0.3);
    let b = SyntheticDataset::generate(1234, 100, 0.3);
    assert_eq!(a, b);

    let c = SyntheticDataset::generate(4321, 100, 0.3);
    assert_ne!(a, c);

    let frauds = a.iter().filter(|t| t.is_fraud).count();
    assert!(frauds > 10 && frauds < 60, "fraud count {frauds} implausible for rate 0.3");
}

#[test]
fn generated_transactions_are_valid() {
    for item in SyntheticDataset::generate(77, 300, 0.5) {
        let json = serde_json::to_string(&item.transaction).unwrap();
        let reparsed = Transaction::from_json(&json).unwrap();
        assert_eq!(reparsed.user_id, item.transaction.user_id);
    }
}

#[test]
fn experiment_replay_is_identical() {
    let first = run(2024, 150);
    let second = run(2024, 150);

    assert_eq!(first.len(), second.len());
    for (a, b) in first.iter().zip(&second) {
        assert_eq!(a.mode, b.mode);
        assert_eq!(a.final_accuracy, b.final_accuracy, "{} diverged", a.mode.as_str());
        assert_eq!(a.playbook_size, b.playbook_size);
        assert_eq!(a.iteration_metrics, b.iteration_metrics);
    }
}
