//! Playbook store versioning and the online learning step.

use acefraud_core::{
    aggregator::Aggregator,
    analysis::{Decision, Mode},
    analyzer::AnalyzerKind,
    config::{AceConfig, LearningConfig},
    engine::FraudEngine,
    error::AceError,
    event::PlaybookEvent,
    learning::Learner,
    pipeline::Pipeline,
    playbook::{smoothed_rate, Bullet, Comparator, Feature, HeuristicRule, Playbook, PlaybookStore},
    registry::AnalyzerRegistry,
    transaction::Transaction,
};
use chrono::Utc;

const SKETCHY: &str = include_str!("../../data/samples/sketchy_transaction.json");

fn pipeline() -> Pipeline {
    Pipeline::new(AnalyzerRegistry::standard(12.0), Aggregator::default())
}

fn quiet_tx() -> Transaction {
    Transaction::from_json(
        r#"{"user_id":"u-quiet","user_age_days":200,"total_transactions":50,"amount":2500.0,
            "time":"14:00","merchant":"Target","merchant_rating":4.0,"merchant_fraud_reports":0,
            "location":"Denver, CO","previous_location":"Denver, CO"}"#,
    )
    .unwrap()
}

#[test]
fn commit_bumps_version_and_rejects_stale_writers() {
    let store = PlaybookStore::new(Playbook::empty());
    let (v1, id) = store
        .commit(0, |pb| {
            pb.add_bullet(
                AnalyzerKind::PatternDetector,
                HeuristicRule::new(Feature::Amount, Comparator::AtLeast, 900.0, 12.0),
                Utc::now(),
            )
        })
        .unwrap();
    assert_eq!(v1, 1);
    assert_eq!(id, "pat-00001");

    let stale = store.commit(0, |_| ());
    assert!(matches!(stale, Err(AceError::PlaybookConflict { expected: 0, actual: 1 })));
    assert_eq!(store.snapshot().unwrap().len(), 1);
}

#[test]
fn snapshots_are_isolated_from_later_commits() {
    let store = PlaybookStore::new(Playbook::empty());
    let before = store.snapshot().unwrap();
    store
        .commit(0, |pb| {
            pb.add_bullet(
                AnalyzerKind::VelocityChecker,
                HeuristicRule::new(Feature::DailyVelocity, Comparator::AtLeast, 6.0, 12.0),
                Utc::now(),
            )
        })
        .unwrap();
    assert!(before.is_empty());
    assert_eq!(store.snapshot().unwrap().len(), 1);
}

#[test]
fn concurrent_commits_are_serialized() {
    let store = PlaybookStore::new(Playbook::empty());
    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                for _ in 0..10 {
                    loop {
                        let expected = store.version().unwrap();
                        let outcome = store.commit(expected, |pb| {
                            pb.add_bullet(
                                AnalyzerKind::GeographicAnalyzer,
                                HeuristicRule::new(Feature::HourOfDay, Comparator::AtMost, 3.0, 8.0),
                                Utc::now(),
                            )
                        });
                        if outcome.is_ok() {
                            break;
                        }
                    }
                }
            });
        }
    });
    let pb = store.snapshot().unwrap();
    assert_eq!(pb.version, 40);
    assert_eq!(pb.len(), 40);
}

#[test]
fn bullet_ids_are_unique_and_prefixed() {
    let mut pb = AceConfig::default_test().offline_playbook();
    let id = pb.add_bullet(
        AnalyzerKind::MerchantRiskAnalyzer,
        HeuristicRule::new(Feature::MerchantFraudReports, Comparator::AtLeast, 3.0, 12.0),
        Utc::now(),
    );
    assert!(id.starts_with("mer-"));
    assert_eq!(pb.len(), 11);
    assert!(pb.get(&id).is_some());
}

#[test]
fn grouped_view_lists_every_analyzer() {
    let pb = Playbook::empty();
    let grouped = pb.grouped();
    assert_eq!(grouped.len(), 5);
    assert!(grouped.values().all(|b| b.is_empty()));

    let seeded = AceConfig::default_test().offline_playbook().grouped();
    for kind in AnalyzerKind::ALL {
        assert_eq!(seeded[&kind].len(), 2, "{}", kind.as_str());
        assert!(seeded[&kind].iter().all(|b| b.node == kind));
    }
}

#[test]
fn success_rate_is_smoothed() {
    assert_eq!(smoothed_rate(0, 0), 0.5);
    let mut b = Bullet::new(
        "beh-00009".into(),
        AnalyzerKind::BehavioralAnalyzer,
        HeuristicRule::new(Feature::AccountAgeDays, Comparator::AtMost, 10.0, 12.0),
        Utc::now(),
    );
    b.record_outcome(true);
    b.record_outcome(true);
    b.record_outcome(false);
    assert_eq!(b.uses(), 3);
    assert_eq!(b.times_selected, 3);
    assert!((b.success_rate - 0.6).abs() < 1e-12);
}

#[test]
fn rule_descriptions_are_readable() {
    let rule = HeuristicRule::new(Feature::Amount, Comparator::AtLeast, 5000.0, 10.0);
    assert_eq!(rule.describe(), "When amount >= 5000, raise risk by 10");
    let geo = HeuristicRule::new(Feature::LocationChanged, Comparator::AtLeast, 1.0, -12.0);
    assert_eq!(geo.describe(), "When location changed, lower risk by 12");
}

#[test]
fn wrong_decline_scores_bullets_and_discovers_approval_rules() {
    let pipeline = pipeline();
    let learner = Learner::new(LearningConfig::default());
    let mut pb = AceConfig::default_test().offline_playbook();
    let tx = Transaction::from_json(SKETCHY).unwrap();

    let result = pipeline.score(&tx, Mode::OnlineAce, &pb);
    assert_eq!(result.decision, Decision::Decline);
    let applied: usize = result.analyzer_results.values().map(|a| a.applied_bullets.len()).sum();

    let before = pb.len();
    let events = learner.apply(&mut pb, &pipeline.registry, &result, false, Utc::now());

    let scored: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            PlaybookEvent::BulletScored { helpful, .. } => Some(*helpful),
            _ => None,
        })
        .collect();
    assert_eq!(scored.len(), applied);
    // Every applied bullet argued for fraud on a legitimate transaction.
    assert!(scored.iter().all(|h| !h));

    let added: Vec<&str> = events
        .iter()
        .filter(|e| matches!(e, PlaybookEvent::BulletAdded { .. }))
        .map(|e| e.bullet_id())
        .collect();
    assert!(!added.is_empty());
    assert_eq!(pb.len(), before + added.len());
    for id in &added {
        let bullet = pb.get(id).unwrap();
        assert!(!bullet.rule.indicates_fraud());
        assert!(bullet.rule.matches(&tx));
        assert_eq!(result.analyzer_results[&bullet.node].recommendation, Decision::Decline);
    }

    // No analyzer ends up with two active bullets testing the same condition.
    for kind in AnalyzerKind::ALL {
        let active = pb.active_for(kind);
        for (i, a) in active.iter().enumerate() {
            for b in &active[i + 1..] {
                assert!(!a.rule.same_condition(&b.rule), "{} duplicated {}", kind.as_str(), a.id);
            }
        }
    }
}

#[test]
fn correct_decision_discovers_nothing() {
    let pipeline = pipeline();
    let learner = Learner::new(LearningConfig::default());
    let mut pb = AceConfig::default_test().offline_playbook();
    let tx = Transaction::from_json(SKETCHY).unwrap();

    let result = pipeline.score(&tx, Mode::OnlineAce, &pb);
    let events = learner.apply(&mut pb, &pipeline.registry, &result, true, Utc::now());

    assert!(events.iter().all(|e| matches!(e, PlaybookEvent::BulletScored { helpful: true, .. })));
    assert_eq!(pb.len(), 10);
    let pat = pb.get("pat-00001").unwrap();
    assert_eq!(pat.helpful_count, 19);
}

#[test]
fn persistently_harmful_bullet_is_retired() {
    let pipeline = pipeline();
    let learner = Learner::new(LearningConfig::default());

    let mut bullet = Bullet::new(
        "pat-00001".into(),
        AnalyzerKind::PatternDetector,
        HeuristicRule::new(Feature::Amount, Comparator::AtLeast, 5000.0, 10.0),
        Utc::now(),
    );
    bullet.harmful_count = 3;
    bullet.success_rate = smoothed_rate(0, 3);
    let mut pb = Playbook::from_bullets(vec![bullet]);

    let tx = Transaction::from_json(SKETCHY).unwrap();
    let result = pipeline.score(&tx, Mode::OnlineAce, &pb);
    assert_eq!(
        result.analyzer_results[&AnalyzerKind::PatternDetector].applied_bullets,
        vec!["pat-00001".to_string()]
    );

    learner.apply(&mut pb, &pipeline.registry, &result, false, Utc::now());
    assert!(!pb.get("pat-00001").unwrap().retired);

    let events = learner.apply(&mut pb, &pipeline.registry, &result, false, Utc::now());
    let bullet = pb.get("pat-00001").unwrap();
    assert!(bullet.retired);
    assert_eq!(bullet.uses(), 5);
    assert!(events
        .iter()
        .any(|e| matches!(e, PlaybookEvent::BulletRetired { bullet_id, .. } if bullet_id == "pat-00001")));

    // Retired bullets stay stored but are no longer consulted or scored.
    assert!(pb.active_for(AnalyzerKind::PatternDetector).iter().all(|b| b.id != "pat-00001"));
    let rescored = pipeline.score(&tx, Mode::OnlineAce, &pb);
    assert!(!rescored.analyzer_results[&AnalyzerKind::PatternDetector]
        .applied_bullets
        .contains(&"pat-00001".to_string()));
    learner.apply(&mut pb, &pipeline.registry, &result, false, Utc::now());
    assert_eq!(pb.get("pat-00001").unwrap().uses(), 5);
}

#[test]
fn discovery_respects_node_cap() {
    let pipeline = pipeline();
    let learner = Learner::new(LearningConfig { max_bullets_per_node: 0, ..LearningConfig::default() });
    let mut pb = Playbook::empty();
    let tx = quiet_tx();

    let result = pipeline.score(&tx, Mode::OnlineAce, &pb);
    assert_eq!(result.decision, Decision::Approve);
    let events = learner.apply(&mut pb, &pipeline.registry, &result, true, Utc::now());
    assert!(events.is_empty());
    assert!(pb.is_empty());
}

#[test]
fn feedback_on_missed_fraud_raises_future_risk() {
    let engine = FraudEngine::build_test().unwrap();
    let tx = quiet_tx();

    let first = engine.analyze(&tx, Mode::OnlineAce).unwrap();
    assert_eq!(first.decision, Decision::Approve);
    assert_eq!(first.playbook_version, 0);

    let outcome = engine.submit_feedback(&first.analysis_id, true).unwrap();
    assert_eq!(outcome.version, 1);
    assert!(outcome.events.iter().any(|e| matches!(e, PlaybookEvent::BulletAdded { .. })));

    let second = engine.analyze(&tx, Mode::OnlineAce).unwrap();
    assert_eq!(second.playbook_version, 1);
    assert!(second.risk_score > first.risk_score);

    // The frozen offline playbook is untouched by online learning.
    let offline = engine.analyze(&tx, Mode::OfflineAce).unwrap();
    assert_eq!(offline.risk_score, first.risk_score);
    assert_eq!(engine.offline_playbook().len(), 10);
}

#[test]
fn correct_decision_without_bullets_keeps_version() {
    let engine = FraudEngine::build_test().unwrap();
    let result = engine.analyze(&quiet_tx(), Mode::OnlineAce).unwrap();
    assert_eq!(result.decision, Decision::Approve);
    assert!(result.analyzer_results.values().all(|a| a.applied_bullets.is_empty()));

    let outcome = engine.submit_feedback(&result.analysis_id, false).unwrap();
    assert!(outcome.events.is_empty());
    assert_eq!(outcome.version, 0);
    assert_eq!(engine.playbook_version().unwrap(), 0);
    assert!(engine.store.has_feedback(&result.analysis_id).unwrap());
    assert!(engine.store.load_playbook().unwrap().is_none());

    let store = PlaybookStore::new(AceConfig::default_test().offline_playbook());
    let learner = Learner::new(LearningConfig::default());
    let mut persisted = 0;
    let outcome = learner
        .commit(&store, &pipeline().registry, &result, false, |_, _| {
            persisted += 1;
            Ok(())
        })
        .unwrap();
    assert_eq!(outcome.version, 0);
    assert_eq!(persisted, 0);
    assert_eq!(store.version().unwrap(), 0);
}
