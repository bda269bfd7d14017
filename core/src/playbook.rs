//! Playbook — the weighted heuristic bullets consulted in ACE modes.
//!
//! RULE: Analyzers never read the store directly. Each transaction is
//! scored against one Arc<Playbook> snapshot, and every mutation goes
//! through PlaybookStore::commit(), which checks the version it was
//! computed against before swapping the new playbook in.

use crate::{
    analyzer::AnalyzerKind,
    error::{AceError, AceResult},
    transaction::Transaction,
    types::{BulletId, PlaybookVersion},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

// ── Heuristic rules ──────────────────────────────────────────────────────────

/// A transaction feature a heuristic can test.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    AccountAgeDays,
    TotalTransactions,
    Amount,
    HourOfDay,
    MerchantRating,
    MerchantFraudReports,
    /// 1.0 when the location differs from the previous one, else 0.0.
    LocationChanged,
    DailyVelocity,
}

impl Feature {
    pub fn value(&self, tx: &Transaction) -> f64 {
        match self {
            Self::AccountAgeDays => tx.user_age_days as f64,
            Self::TotalTransactions => tx.total_transactions as f64,
            Self::Amount => tx.amount,
            Self::HourOfDay => tx.hour() as f64,
            Self::MerchantRating => tx.merchant_rating,
            Self::MerchantFraudReports => tx.merchant_fraud_reports as f64,
            Self::LocationChanged => {
                if tx.location_changed() {
                    1.0
                } else {
                    0.0
                }
            }
            Self::DailyVelocity => tx.daily_velocity(),
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            Self::AccountAgeDays => "account age (days)",
            Self::TotalTransactions => "prior transactions",
            Self::Amount => "amount",
            Self::HourOfDay => "hour of day",
            Self::MerchantRating => "merchant rating",
            Self::MerchantFraudReports => "merchant fraud reports",
            Self::LocationChanged => "location change",
            Self::DailyVelocity => "transactions per day",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Comparator {
    AtLeast,
    AtMost,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HeuristicRule {
    pub feature: Feature,
    pub comparator: Comparator,
    pub threshold: f64,
    /// Points added to the analyzer's score when the rule matches.
    /// Negative deltas argue for approval.
    pub risk_delta: f64,
}

impl HeuristicRule {
    pub fn new(feature: Feature, comparator: Comparator, threshold: f64, risk_delta: f64) -> Self {
        Self { feature, comparator, threshold, risk_delta }
    }

    pub fn matches(&self, tx: &Transaction) -> bool {
        let v = self.feature.value(tx);
        match self.comparator {
            Comparator::AtLeast => v >= self.threshold,
            Comparator::AtMost => v <= self.threshold,
        }
    }

    /// True when both rules test the same condition, regardless of delta.
    pub fn same_condition(&self, other: &HeuristicRule) -> bool {
        self.feature == other.feature
            && self.comparator == other.comparator
            && (self.threshold - other.threshold).abs() < 1e-9
    }

    pub fn indicates_fraud(&self) -> bool {
        self.risk_delta > 0.0
    }

    pub fn describe(&self) -> String {
        let op = match self.comparator {
            Comparator::AtLeast => ">=",
            Comparator::AtMost => "<=",
        };
        let verdict = if self.indicates_fraud() { "raise" } else { "lower" };
        if self.feature == Feature::LocationChanged {
            let when = if self.matches_flag() { "location changed" } else { "location unchanged" };
            return format!("When {when}, {verdict} risk by {:.0}", self.risk_delta.abs());
        }
        format!(
            "When {} {op} {}, {verdict} risk by {:.0}",
            self.feature.describe(),
            trim_float(self.threshold),
            self.risk_delta.abs()
        )
    }

    fn matches_flag(&self) -> bool {
        match self.comparator {
            Comparator::AtLeast => self.threshold > 0.0,
            Comparator::AtMost => self.threshold >= 1.0,
        }
    }
}

fn trim_float(v: f64) -> String {
    if v.fract().abs() < 1e-9 {
        format!("{v:.0}")
    } else {
        format!("{v:.2}")
    }
}

// ── Bullets ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bullet {
    pub id: BulletId,
    pub content: String,
    pub node: AnalyzerKind,
    pub rule: HeuristicRule,
    pub helpful_count: u32,
    pub harmful_count: u32,
    pub success_rate: f64,
    pub times_selected: u32,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub retired: bool,
}

impl Bullet {
    pub fn new(id: BulletId, node: AnalyzerKind, rule: HeuristicRule, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            content: rule.describe(),
            node,
            rule,
            helpful_count: 0,
            harmful_count: 0,
            success_rate: smoothed_rate(0, 0),
            times_selected: 0,
            created_at,
            retired: false,
        }
    }

    pub fn uses(&self) -> u32 {
        self.helpful_count + self.harmful_count
    }

    /// Count one scored use and refresh the success rate.
    pub fn record_outcome(&mut self, helpful: bool) {
        self.times_selected += 1;
        if helpful {
            self.helpful_count += 1;
        } else {
            self.harmful_count += 1;
        }
        self.success_rate = smoothed_rate(self.helpful_count, self.harmful_count);
    }
}

/// Laplace-smoothed: an unused bullet sits at 0.5.
pub fn smoothed_rate(helpful: u32, harmful: u32) -> f64 {
    (helpful as f64 + 1.0) / ((helpful + harmful) as f64 + 2.0)
}

// ── Playbook ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Playbook {
    pub version: PlaybookVersion,
    next_seq: u64,
    bullets: BTreeMap<BulletId, Bullet>,
}

impl Playbook {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_bullets(bullets: Vec<Bullet>) -> Self {
        let mut playbook = Self::default();
        for bullet in bullets {
            playbook.bullets.insert(bullet.id.clone(), bullet);
        }
        playbook.next_seq = playbook.bullets.len() as u64;
        playbook
    }

    pub fn len(&self) -> usize {
        self.bullets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bullets.is_empty()
    }

    /// Bullets still consulted by analyzers.
    pub fn active_len(&self) -> usize {
        self.bullets.values().filter(|b| !b.retired).count()
    }

    pub fn get(&self, id: &str) -> Option<&Bullet> {
        self.bullets.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Bullet> {
        self.bullets.get_mut(id)
    }

    pub fn bullets(&self) -> impl Iterator<Item = &Bullet> {
        self.bullets.values()
    }

    /// Active bullets owned by one analyzer, in id order.
    pub fn active_for(&self, node: AnalyzerKind) -> Vec<&Bullet> {
        self.bullets
            .values()
            .filter(|b| b.node == node && !b.retired)
            .collect()
    }

    pub fn has_active_rule(&self, node: AnalyzerKind, rule: &HeuristicRule) -> bool {
        self.active_for(node).iter().any(|b| b.rule.same_condition(rule))
    }

    /// All bullets grouped by owning analyzer, every analyzer present.
    pub fn grouped(&self) -> BTreeMap<AnalyzerKind, Vec<Bullet>> {
        let mut groups: BTreeMap<AnalyzerKind, Vec<Bullet>> =
            AnalyzerKind::ALL.iter().map(|k| (*k, Vec::new())).collect();
        for bullet in self.bullets.values() {
            groups.entry(bullet.node).or_default().push(bullet.clone());
        }
        groups
    }

    /// Append a new bullet and return its id.
    pub fn add_bullet(&mut self, node: AnalyzerKind, rule: HeuristicRule, now: DateTime<Utc>) -> BulletId {
        let id = loop {
            self.next_seq += 1;
            let candidate = format!("{}-{:05}", node.id_prefix(), self.next_seq);
            if !self.bullets.contains_key(&candidate) {
                break candidate;
            }
        };
        self.bullets.insert(id.clone(), Bullet::new(id.clone(), node, rule, now));
        id
    }
}

// ── Store ────────────────────────────────────────────────────────────────────

/// Owned, versioned holder of the live playbook.
#[derive(Debug, Default)]
pub struct PlaybookStore {
    current: RwLock<Arc<Playbook>>,
}

impl PlaybookStore {
    pub fn new(playbook: Playbook) -> Self {
        Self { current: RwLock::new(Arc::new(playbook)) }
    }

    /// A consistent view for one transaction's analyzers.
    pub fn snapshot(&self) -> AceResult<Arc<Playbook>> {
        let guard = self
            .current
            .read()
            .map_err(|_| anyhow::anyhow!("playbook lock poisoned"))?;
        Ok(Arc::clone(&guard))
    }

    pub fn version(&self) -> AceResult<PlaybookVersion> {
        Ok(self.snapshot()?.version)
    }

    /// Compare-and-swap update. `mutate` runs on a private copy, which
    /// replaces the current playbook only if nobody committed since
    /// `expected` was read. The write lock keeps commits serialized.
    pub fn commit<T, F>(&self, expected: PlaybookVersion, mutate: F) -> AceResult<(PlaybookVersion, T)>
    where
        F: FnOnce(&mut Playbook) -> T,
    {
        let mut guard = self
            .current
            .write()
            .map_err(|_| anyhow::anyhow!("playbook lock poisoned"))?;
        if guard.version != expected {
            return Err(AceError::PlaybookConflict {
                expected,
                actual: guard.version,
            });
        }
        let mut next = Playbook::clone(&guard);
        let out = mutate(&mut next);
        next.version = expected + 1;
        let version = next.version;
        *guard = Arc::new(next);
        Ok((version, out))
    }

    /// Install `next` as version `expected + 1`. `persist` sees the new
    /// playbook before anyone else does; if it fails, the current
    /// playbook stays in place and the error is returned.
    pub fn publish<P>(&self, expected: PlaybookVersion, mut next: Playbook, persist: P) -> AceResult<PlaybookVersion>
    where
        P: FnOnce(&Playbook) -> AceResult<()>,
    {
        let mut guard = self
            .current
            .write()
            .map_err(|_| anyhow::anyhow!("playbook lock poisoned"))?;
        if guard.version != expected {
            return Err(AceError::PlaybookConflict {
                expected,
                actual: guard.version,
            });
        }
        next.version = expected + 1;
        persist(&next)?;
        let version = next.version;
        *guard = Arc::new(next);
        Ok(version)
    }

    /// Replace the playbook wholesale (used when restoring from disk).
    pub fn replace(&self, playbook: Playbook) -> AceResult<()> {
        let mut guard = self
            .current
            .write()
            .map_err(|_| anyhow::anyhow!("playbook lock poisoned"))?;
        *guard = Arc::new(playbook);
        Ok(())
    }
}
