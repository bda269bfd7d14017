//! Playbook change events.
//!
//! RULE: Every playbook mutation is described by events.
//! Learning commits return them; the engine persists them to event_log.

use crate::{
    analyzer::AnalyzerKind,
    types::{AnalysisId, BulletId, PlaybookVersion},
};
use serde::{Deserialize, Serialize};

/// Variants are append-only; stored payloads depend on the tags.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlaybookEvent {
    BulletAdded {
        bullet_id: BulletId,
        node: AnalyzerKind,
        content: String,
    },
    BulletScored {
        bullet_id: BulletId,
        node: AnalyzerKind,
        helpful: bool,
        success_rate: f64,
    },
    BulletRetired {
        bullet_id: BulletId,
        node: AnalyzerKind,
        success_rate: f64,
    },
}

impl PlaybookEvent {
    /// Stable name for the event_type column.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::BulletAdded { .. } => "bullet_added",
            Self::BulletScored { .. } => "bullet_scored",
            Self::BulletRetired { .. } => "bullet_retired",
        }
    }

    pub fn bullet_id(&self) -> &str {
        match self {
            Self::BulletAdded { bullet_id, .. }
            | Self::BulletScored { bullet_id, .. }
            | Self::BulletRetired { bullet_id, .. } => bullet_id,
        }
    }
}

/// The event log entry as persisted to SQLite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub id: Option<i64>,
    pub playbook_version: PlaybookVersion,
    pub analysis_id: Option<AnalysisId>,
    pub event_type: String,
    pub payload: String, // JSON-serialized PlaybookEvent
}
