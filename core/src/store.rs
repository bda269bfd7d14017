//! SQLite persistence layer.
//!
//! RULE: Only store.rs talks to the database.
//! The engine calls store methods; nothing else executes SQL.

use crate::{
    analysis::{AgentAnalysis, FraudAnalysisResult},
    error::AceResult,
    event::EventLogEntry,
    experiment::ExperimentResult,
    playbook::Playbook,
};
use rusqlite::{params, Connection, OptionalExtension};

pub struct AnalysisStore {
    conn: Connection,
}

impl AnalysisStore {
    /// Open (or create) the database at `path`.
    pub fn open(path: &str) -> AceResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode: better concurrent read performance.
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> AceResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> AceResult<()> {
        self.conn
            .execute_batch(include_str!("../../migrations/001_foundation.sql"))?;
        self.conn
            .execute_batch(include_str!("../../migrations/002_playbook_experiments.sql"))?;
        Ok(())
    }

    // ── Analyses ───────────────────────────────────────────────

    /// Persist a result and each of its analyzer outputs atomically.
    pub fn save_analysis(&self, result: &FraudAnalysisResult) -> AceResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO analysis
               (analysis_id, mode, playbook_version, decision, risk_score, confidence, created_at, payload)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                result.analysis_id,
                result.mode.as_str(),
                result.playbook_version as i64,
                result.decision.as_str(),
                result.risk_score,
                result.confidence,
                result.timestamp.to_rfc3339(),
                serde_json::to_string(result)?,
            ],
        )?;
        for (kind, analysis) in &result.analyzer_results {
            tx.execute(
                "INSERT INTO agent_analysis
                   (agent_analysis_id, analysis_id, analyzer, risk_score, recommendation, payload)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    result.agent_analysis_id(*kind),
                    result.analysis_id,
                    kind.as_str(),
                    analysis.risk_score,
                    analysis.recommendation.as_str(),
                    serde_json::to_string(analysis)?,
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn load_analysis(&self, analysis_id: &str) -> AceResult<Option<FraudAnalysisResult>> {
        let payload: Option<String> = self
            .conn
            .query_row(
                "SELECT payload FROM analysis WHERE analysis_id = ?1",
                params![analysis_id],
                |row| row.get(0),
            )
            .optional()?;
        payload
            .map(|p| serde_json::from_str(&p).map_err(Into::into))
            .transpose()
    }

    pub fn load_agent_analysis(&self, agent_analysis_id: &str) -> AceResult<Option<AgentAnalysis>> {
        let payload: Option<String> = self
            .conn
            .query_row(
                "SELECT payload FROM agent_analysis WHERE agent_analysis_id = ?1",
                params![agent_analysis_id],
                |row| row.get(0),
            )
            .optional()?;
        payload
            .map(|p| serde_json::from_str(&p).map_err(Into::into))
            .transpose()
    }

    pub fn analysis_count(&self) -> AceResult<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM analysis", [], |row| row.get(0))?)
    }

    pub fn decision_count(&self, decision: &str) -> AceResult<i64> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM analysis WHERE decision = ?1",
            params![decision],
            |row| row.get(0),
        )?)
    }

    // ── Feedback ───────────────────────────────────────────────

    pub fn has_feedback(&self, analysis_id: &str) -> AceResult<bool> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM feedback WHERE analysis_id = ?1",
            params![analysis_id],
            |row| row.get(0),
        )?;
        Ok(n > 0)
    }

    pub fn record_feedback(&self, analysis_id: &str, is_fraud: bool, playbook_version: u64) -> AceResult<()> {
        self.conn.execute(
            "INSERT INTO feedback (analysis_id, is_fraud, playbook_version) VALUES (?1, ?2, ?3)",
            params![analysis_id, is_fraud, playbook_version as i64],
        )?;
        Ok(())
    }

    /// Claim the feedback slot, log the learning events and save the
    /// learned playbook in one transaction. Nothing is written unless
    /// all of it is.
    pub fn record_learning(
        &self,
        analysis_id: &str,
        is_fraud: bool,
        playbook: &Playbook,
        events: &[EventLogEntry],
    ) -> AceResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO feedback (analysis_id, is_fraud, playbook_version) VALUES (?1, ?2, ?3)",
            params![analysis_id, is_fraud, playbook.version as i64],
        )?;
        for entry in events {
            tx.execute(
                "INSERT INTO event_log (playbook_version, analysis_id, event_type, payload)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    entry.playbook_version as i64,
                    entry.analysis_id,
                    entry.event_type,
                    entry.payload,
                ],
            )?;
        }
        tx.execute(
            "INSERT INTO playbook (id, version, payload) VALUES (1, ?1, ?2)
             ON CONFLICT(id) DO UPDATE SET version = excluded.version, payload = excluded.payload",
            params![playbook.version as i64, serde_json::to_string(playbook)?],
        )?;
        tx.commit()?;
        Ok(())
    }

    // ── Event log ──────────────────────────────────────────────

    pub fn events_for_analysis(&self, analysis_id: &str) -> AceResult<Vec<EventLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, playbook_version, analysis_id, event_type, payload
             FROM event_log WHERE analysis_id = ?1
             ORDER BY id ASC",
        )?;
        let entries = stmt
            .query_map(params![analysis_id], |row| {
                Ok(EventLogEntry {
                    id: Some(row.get(0)?),
                    playbook_version: row.get::<_, i64>(1)? as u64,
                    analysis_id: row.get(2)?,
                    event_type: row.get(3)?,
                    payload: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn event_count(&self, event_type: &str) -> AceResult<i64> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM event_log WHERE event_type = ?1",
            params![event_type],
            |row| row.get(0),
        )?)
    }

    // ── Playbook ───────────────────────────────────────────────

    pub fn load_playbook(&self) -> AceResult<Option<Playbook>> {
        let payload: Option<String> = self
            .conn
            .query_row("SELECT payload FROM playbook WHERE id = 1", [], |row| row.get(0))
            .optional()?;
        payload
            .map(|p| serde_json::from_str(&p).map_err(Into::into))
            .transpose()
    }

    // ── Experiments ────────────────────────────────────────────

    pub fn save_experiment(&self, result: &ExperimentResult) -> AceResult<i64> {
        self.conn.execute(
            "INSERT INTO experiment_run
               (mode, problems_processed, final_accuracy, playbook_size, execution_time, payload)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                result.mode.as_str(),
                result.problems_processed as i64,
                result.final_accuracy,
                result.playbook_size as i64,
                result.execution_time,
                serde_json::to_string(result)?,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn experiment_count(&self) -> AceResult<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM experiment_run", [], |row| row.get(0))?)
    }
}
