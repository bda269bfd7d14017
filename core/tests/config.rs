//! Shipped config files and validation.

use acefraud_core::{
    analyzer::AnalyzerKind,
    config::{default_offline_bullets, AceConfig},
    engine::FraudEngine,
    error::AceError,
    store::AnalysisStore,
};

fn data_dir() -> String {
    format!("{}/../data", env!("CARGO_MANIFEST_DIR"))
}

#[test]
fn shipped_config_loads() {
    let config = AceConfig::load(&data_dir()).unwrap();
    assert_eq!(config.decision_threshold, 50.0);
    assert_eq!(config.offline_bullets.len(), 10);
    for kind in AnalyzerKind::ALL {
        assert_eq!(config.weights[&kind], kind.default_weight());
    }
}

#[test]
fn shipped_playbook_matches_builtin_seeds() {
    let config = AceConfig::load(&data_dir()).unwrap();
    let builtin = default_offline_bullets();
    assert_eq!(config.offline_bullets.len(), builtin.len());
    for (file, seed) in config.offline_bullets.iter().zip(&builtin) {
        assert_eq!(file.id, seed.id);
        assert_eq!(file.node, seed.node);
        assert_eq!(file.rule, seed.rule);
        assert_eq!(file.helpful_count, seed.helpful_count);
        assert_eq!(file.harmful_count, seed.harmful_count);
    }
}

#[test]
fn offline_seeds_are_prefixed_by_owner() {
    for bullet in default_offline_bullets() {
        assert!(bullet.id.starts_with(bullet.node.id_prefix()), "{}", bullet.id);
        assert!(bullet.success_rate > 0.5);
        assert!(!bullet.content.is_empty());
    }
}

#[test]
fn missing_data_dir_is_an_error() {
    assert!(AceConfig::load("/definitely/not/here").is_err());
}

#[test]
fn engine_rejects_bad_weights() {
    let mut config = AceConfig::default_test();
    config.weights.insert(AnalyzerKind::GeographicAnalyzer, 0.9);
    let store = AnalysisStore::in_memory().unwrap();
    store.migrate().unwrap();
    assert!(matches!(FraudEngine::new(config, store), Err(AceError::InvalidConfig(_))));
}

#[test]
fn learning_settings_validated() {
    let mut config = AceConfig::default_test();
    config.learning.prune_below = 1.5;
    assert!(config.validate().is_err());

    let mut config = AceConfig::default_test();
    config.learning.discovery_delta = 0.0;
    assert!(config.validate().is_err());

    assert!(AceConfig::default_test().validate().is_ok());
}
