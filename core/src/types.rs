//! Shared primitive types used across the engine.

/// Identifier of one scored transaction (uuid v4).
pub type AnalysisId = String;

/// Identifier of a playbook bullet, e.g. `mrk-00003`.
pub type BulletId = String;

/// Monotonic playbook version. Bumped on every committed mutation.
pub type PlaybookVersion = u64;
