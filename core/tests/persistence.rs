//! Stored analyses, agent lookups, feedback and playbook restore.

use acefraud_core::{
    analysis::{agent_analysis_id, Mode},
    analyzer::AnalyzerKind,
    config::AceConfig,
    engine::FraudEngine,
    error::AceError,
    store::AnalysisStore,
    transaction::Transaction,
};

const SKETCHY: &str = include_str!("../../data/samples/sketchy_transaction.json");
const TRUSTED: &str = include_str!("../../data/samples/trusted_transaction.json");

#[test]
fn agent_analysis_retrievable_by_id() {
    let engine = FraudEngine::build_test().unwrap();
    let result = engine.analyze_json(SKETCHY, Mode::OfflineAce).unwrap();

    for kind in AnalyzerKind::ALL {
        let id = result.agent_analysis_id(kind);
        assert_eq!(id, agent_analysis_id(&result.analysis_id, kind));
        let stored = engine.agent_analysis(&id).unwrap();
        let original = &result.analyzer_results[&kind];
        assert_eq!(stored.name, kind);
        assert_eq!(stored.recommendation, original.recommendation);
        assert_eq!(stored.findings, original.findings);
        assert_eq!(stored.applied_bullets, original.applied_bullets);
        assert!((stored.risk_score - original.risk_score).abs() < 1e-9);
    }

    let missing = engine.agent_analysis("nope/PatternDetector");
    assert!(matches!(missing, Err(AceError::NotFound { .. })));
}

#[test]
fn full_result_round_trips_through_store() {
    let engine = FraudEngine::build_test().unwrap();
    let result = engine.analyze_json(TRUSTED, Mode::Vanilla).unwrap();
    let loaded = engine.analysis(&result.analysis_id).unwrap();

    assert_eq!(loaded.decision, result.decision);
    assert!((loaded.risk_score - result.risk_score).abs() < 1e-9);
    assert_eq!(loaded.transaction, result.transaction);
    assert_eq!(loaded.analyzer_results.len(), 5);
    assert_eq!(engine.store.analysis_count().unwrap(), 1);
    assert_eq!(engine.store.decision_count("APPROVE").unwrap(), 1);
}

#[test]
fn feedback_recorded_once() {
    let engine = FraudEngine::build_test().unwrap();
    let result = engine.analyze_json(SKETCHY, Mode::OnlineAce).unwrap();

    engine.submit_feedback(&result.analysis_id, true).unwrap();
    assert!(engine.store.has_feedback(&result.analysis_id).unwrap());

    let again = engine.submit_feedback(&result.analysis_id, true);
    assert!(matches!(again, Err(AceError::DuplicateFeedback { .. })));

    let unknown = engine.submit_feedback("no-such-analysis", false);
    assert!(matches!(unknown, Err(AceError::NotFound { .. })));
}

#[test]
fn feedback_on_frozen_modes_leaves_playbook_alone() {
    let engine = FraudEngine::build_test().unwrap();
    for mode in [Mode::Vanilla, Mode::OfflineAce] {
        let result = engine.analyze_json(SKETCHY, mode).unwrap();
        let outcome = engine.submit_feedback(&result.analysis_id, false).unwrap();
        assert!(outcome.events.is_empty());
        assert_eq!(outcome.version, 0);
    }
    assert_eq!(engine.playbook_version().unwrap(), 0);
}

#[test]
fn learning_events_are_logged() {
    let engine = FraudEngine::build_test().unwrap();
    let result = engine.analyze_json(SKETCHY, Mode::OnlineAce).unwrap();
    let outcome = engine.submit_feedback(&result.analysis_id, false).unwrap();

    let logged = engine.store.events_for_analysis(&result.analysis_id).unwrap();
    assert_eq!(logged.len(), outcome.events.len());
    assert!(logged.iter().all(|e| e.playbook_version == outcome.version));
    for (entry, event) in logged.iter().zip(&outcome.events) {
        assert_eq!(entry.event_type, event.type_name());
    }
    assert!(engine.store.event_count("bullet_added").unwrap() > 0);
}

#[test]
fn playbook_view_reports_versions_and_nodes() {
    let engine = FraudEngine::build_test().unwrap();
    let view = engine.playbook().unwrap();
    assert_eq!(view.version, 0);
    assert_eq!(view.total_bullets, 10);
    assert_eq!(view.active_bullets, 10);
    assert_eq!(view.nodes.len(), 5);

    let result = engine.analyze_json(SKETCHY, Mode::OnlineAce).unwrap();
    engine.submit_feedback(&result.analysis_id, false).unwrap();
    let view = engine.playbook().unwrap();
    assert_eq!(view.version, 1);
    assert!(view.total_bullets > 10);
}

#[test]
fn live_playbook_survives_restart() {
    let path = std::env::temp_dir().join(format!("ace-restore-{}.db", uuid::Uuid::new_v4()));
    let path_str = path.to_str().unwrap().to_string();

    let learned_version = {
        let store = AnalysisStore::open(&path_str).unwrap();
        store.migrate().unwrap();
        let engine = FraudEngine::new(AceConfig::default_test(), store).unwrap();
        let tx = Transaction::from_json(SKETCHY).unwrap();
        let result = engine.analyze(&tx, Mode::OnlineAce).unwrap();
        engine.submit_feedback(&result.analysis_id, false).unwrap();
        engine.playbook().unwrap()
    };

    let store = AnalysisStore::open(&path_str).unwrap();
    store.migrate().unwrap();
    let engine = FraudEngine::new(AceConfig::default_test(), store).unwrap();
    let restored = engine.playbook().unwrap();
    assert_eq!(restored.version, learned_version.version);
    assert_eq!(restored.total_bullets, learned_version.total_bullets);
    drop(engine);

    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{path_str}{suffix}"));
    }
}

#[test]
fn failed_feedback_write_leaves_playbook_unlearned() {
    let path = std::env::temp_dir().join(format!("ace-feedback-{}.db", uuid::Uuid::new_v4()));
    let path_str = path.to_str().unwrap().to_string();

    let store = AnalysisStore::open(&path_str).unwrap();
    store.migrate().unwrap();
    let engine = FraudEngine::new(AceConfig::default_test(), store).unwrap();
    let result = engine.analyze_json(SKETCHY, Mode::OnlineAce).unwrap();

    let side = rusqlite::Connection::open(&path_str).unwrap();
    side.execute_batch(
        "CREATE TRIGGER reject_feedback BEFORE INSERT ON feedback
         BEGIN SELECT RAISE(ABORT, 'disk full'); END;",
    )
    .unwrap();

    assert!(engine.submit_feedback(&result.analysis_id, false).is_err());
    assert_eq!(engine.playbook_version().unwrap(), 0);
    assert!(!engine.store.has_feedback(&result.analysis_id).unwrap());
    assert!(engine.store.events_for_analysis(&result.analysis_id).unwrap().is_empty());
    assert!(engine.store.load_playbook().unwrap().is_none());

    side.execute_batch("DROP TRIGGER reject_feedback;").unwrap();
    let outcome = engine.submit_feedback(&result.analysis_id, false).unwrap();
    assert_eq!(outcome.version, 1);

    // Seeded with 4 harmful outcomes; the label is counted exactly once.
    let view = engine.playbook().unwrap();
    let pat = view.nodes[&AnalyzerKind::PatternDetector]
        .iter()
        .find(|b| b.id == "pat-00001")
        .unwrap();
    assert_eq!(pat.harmful_count, 5);
    assert_eq!(engine.store.load_playbook().unwrap().unwrap().version, 1);

    drop(side);
    drop(engine);
    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{path_str}{suffix}"));
    }
}

#[test]
fn experiment_runs_are_persisted() {
    let engine = FraudEngine::build_test().unwrap();
    let dataset = acefraud_core::dataset::SyntheticDataset::generate(3, 20, 0.3);
    engine
        .run_experiment(&acefraud_core::experiment::ExperimentConfig {
            modes: vec![Mode::Vanilla, Mode::OnlineAce],
            dataset,
        })
        .unwrap();
    assert_eq!(engine.store.experiment_count().unwrap(), 2);
}
