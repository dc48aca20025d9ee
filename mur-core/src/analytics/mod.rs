//! Embedded usage analytics
//!
//! A small relational store with three tables: `usage` and `feedback`
//! hold one row per event, `daily` aggregates per pattern and day.
//! Writes are single-row inserts plus an aggregate upsert; reads are
//! aggregation queries.

use std::path::Path;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};

use crate::Result;

/// Feedback rating on an injected pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rating {
    /// The pattern helped
    Helpful,
    /// The pattern did not help
    NotHelpful,
    /// The user skipped rating
    Skip,
}

impl Rating {
    fn as_str(self) -> &'static str {
        match self {
            Rating::Helpful => "helpful",
            Rating::NotHelpful => "not_helpful",
            Rating::Skip => "skip",
        }
    }
}

/// One injection event.
#[derive(Debug, Clone)]
pub struct UsageEvent {
    /// Pattern id
    pub pattern_id: String,
    /// Pattern name at injection time
    pub pattern_name: String,
    /// Receiving tool
    pub tool: String,
    /// Kind of context the injection happened in
    pub context_type: String,
    /// When the injection happened
    pub injected_at: DateTime<Utc>,
    /// Session identifier
    pub session_id: String,
}

/// Aggregated counters for one pattern.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatternSummary {
    /// Total injections
    pub injections: u64,
    /// Helpful ratings
    pub helpful: u64,
    /// Not-helpful ratings
    pub not_helpful: u64,
}

impl PatternSummary {
    /// Helpful fraction of rated injections, if any rating exists.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn helpful_ratio(&self) -> Option<f64> {
        let rated = self.helpful + self.not_helpful;
        (rated > 0).then(|| self.helpful as f64 / rated as f64)
    }
}

/// Embedded analytics database.
pub struct AnalyticsStore {
    conn: Mutex<Connection>,
}

impl AnalyticsStore {
    /// Open or create the database at `path` and apply the schema.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Database`] on open or migration failure.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// In-memory store for tests.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Database`] on schema failure.
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS usage (
                 id           INTEGER PRIMARY KEY AUTOINCREMENT,
                 pattern_id   TEXT NOT NULL,
                 pattern_name TEXT NOT NULL,
                 tool         TEXT NOT NULL,
                 context_type TEXT NOT NULL,
                 injected_at  TEXT NOT NULL,
                 session_id   TEXT NOT NULL
             );
             CREATE TABLE IF NOT EXISTS feedback (
                 id          INTEGER PRIMARY KEY AUTOINCREMENT,
                 pattern_id  TEXT NOT NULL,
                 rating      TEXT NOT NULL CHECK (rating IN ('helpful', 'not_helpful', 'skip')),
                 feedback_at TEXT NOT NULL,
                 notes       TEXT
             );
             CREATE TABLE IF NOT EXISTS daily (
                 pattern_id       TEXT NOT NULL,
                 date             TEXT NOT NULL,
                 injection_count  INTEGER NOT NULL DEFAULT 0,
                 helpful_count    INTEGER NOT NULL DEFAULT 0,
                 not_helpful_count INTEGER NOT NULL DEFAULT 0,
                 PRIMARY KEY (pattern_id, date)
             );
             CREATE INDEX IF NOT EXISTS idx_usage_pattern ON usage (pattern_id);
             CREATE INDEX IF NOT EXISTS idx_feedback_pattern ON feedback (pattern_id);",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Record one injection and bump the daily aggregate.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Database`] on insert failure.
    pub fn record_usage(&self, event: &UsageEvent) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO usage (pattern_id, pattern_name, tool, context_type, injected_at, session_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                event.pattern_id,
                event.pattern_name,
                event.tool,
                event.context_type,
                event.injected_at.to_rfc3339(),
                event.session_id,
            ],
        )?;
        conn.execute(
            "INSERT INTO daily (pattern_id, date, injection_count)
             VALUES (?1, ?2, 1)
             ON CONFLICT (pattern_id, date)
             DO UPDATE SET injection_count = injection_count + 1",
            params![
                event.pattern_id,
                event.injected_at.format("%Y-%m-%d").to_string(),
            ],
        )?;
        Ok(())
    }

    /// Record one feedback event and bump the daily aggregate.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Database`] on insert failure.
    pub fn record_feedback(
        &self,
        pattern_id: &str,
        rating: Rating,
        at: DateTime<Utc>,
        notes: Option<&str>,
    ) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO feedback (pattern_id, rating, feedback_at, notes)
             VALUES (?1, ?2, ?3, ?4)",
            params![pattern_id, rating.as_str(), at.to_rfc3339(), notes],
        )?;

        let (helpful, not_helpful) = match rating {
            Rating::Helpful => (1, 0),
            Rating::NotHelpful => (0, 1),
            Rating::Skip => (0, 0),
        };
        conn.execute(
            "INSERT INTO daily (pattern_id, date, helpful_count, not_helpful_count)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (pattern_id, date)
             DO UPDATE SET helpful_count = helpful_count + ?3,
                           not_helpful_count = not_helpful_count + ?4",
            params![
                pattern_id,
                at.format("%Y-%m-%d").to_string(),
                helpful,
                not_helpful,
            ],
        )?;
        Ok(())
    }

    /// Aggregated counters for one pattern across all days.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Database`] on query failure.
    pub fn pattern_summary(&self, pattern_id: &str) -> Result<PatternSummary> {
        let conn = self.conn.lock();
        let summary = conn.query_row(
            "SELECT COALESCE(SUM(injection_count), 0),
                    COALESCE(SUM(helpful_count), 0),
                    COALESCE(SUM(not_helpful_count), 0)
             FROM daily WHERE pattern_id = ?1",
            params![pattern_id],
            |row| {
                Ok(PatternSummary {
                    injections: row.get::<_, i64>(0)?.max(0) as u64,
                    helpful: row.get::<_, i64>(1)?.max(0) as u64,
                    not_helpful: row.get::<_, i64>(2)?.max(0) as u64,
                })
            },
        )?;
        Ok(summary)
    }

    /// The most-injected patterns, `(pattern_id, injections)`, best first.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Database`] on query failure.
    pub fn top_patterns(&self, limit: usize) -> Result<Vec<(String, u64)>> {
        let conn = self.conn.lock();
        let mut statement = conn.prepare(
            "SELECT pattern_id, SUM(injection_count) AS total
             FROM daily GROUP BY pattern_id
             ORDER BY total DESC, pattern_id ASC LIMIT ?1",
        )?;
        let rows = statement.query_map(params![limit as i64], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?.max(0) as u64))
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}
