// src/memory/store.rs — SQLite operations

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction};

use crate::core::types::{Action, ActionKind, BehaviorPattern, MergeMarker, PatternKind};
use crate::infra::errors::ForesightError;
use crate::memory::schema;
use crate::memory::{PersistedState, StorageAdapter};

const MERGE_MARKER_KEY: &str = "merge_marker";

/// SQLite-backed storage for actions and patterns.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> Result<Self, ForesightError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        // WAL keeps readers from blocking the writer
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        schema::run_migrations(&conn)?;
        Ok(Self::new(conn))
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> Result<Self, ForesightError> {
        let conn = Connection::open_in_memory()?;
        schema::run_migrations(&conn)?;
        Ok(Self::new(conn))
    }

    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, ForesightError> {
        self.conn.lock().map_err(|_| ForesightError::LockPoisoned)
    }

    pub fn count_actions(&self) -> Result<usize, ForesightError> {
        let conn = self.lock()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM actions", [], |r| r.get(0))?;
        Ok(n as usize)
    }

    // -- Actions --

    /// Stored actions, oldest first. Rows that no longer decode are logged and
    /// skipped so one bad record does not hide the rest.
    fn query_actions(conn: &Connection) -> Result<Vec<Action>, ForesightError> {
        let mut stmt = conn.prepare(
            "SELECT id, kind, payload, occurred_at, context FROM actions ORDER BY seq ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut result = Vec::new();
        for row in rows {
            let (id, kind, payload, occurred_at, context) = row?;
            match decode_action(id.clone(), &kind, &payload, &occurred_at, &context) {
                Ok(action) => result.push(action),
                Err(e) => tracing::warn!("Skipping corrupt action {}: {}", id, e),
            }
        }
        Ok(result)
    }

    fn insert_action(tx: &Transaction<'_>, action: &Action) -> Result<(), ForesightError> {
        tx.execute(
            "INSERT OR REPLACE INTO actions (id, kind, payload, occurred_at, context)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                action.id,
                action.kind.as_str(),
                serde_json::to_string(&action.payload)?,
                format_timestamp(action.occurred_at),
                serde_json::to_string(&action.context)?,
            ],
        )?;
        Ok(())
    }

    // -- Patterns --

    fn query_patterns(conn: &Connection) -> Result<Vec<BehaviorPattern>, ForesightError> {
        let mut stmt = conn.prepare(
            "SELECT signature, id, kind, frequency, time_conditions, conditions,
                    action_kinds, confidence, last_updated
             FROM patterns ORDER BY signature ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(PatternRow {
                signature: row.get(0)?,
                id: row.get(1)?,
                kind: row.get(2)?,
                frequency: row.get(3)?,
                time_conditions: row.get(4)?,
                conditions: row.get(5)?,
                action_kinds: row.get(6)?,
                confidence: row.get(7)?,
                last_updated: row.get(8)?,
            })
        })?;

        let mut result = Vec::new();
        for row in rows {
            let row = row?;
            let signature = row.signature.clone();
            match row.into_pattern() {
                Ok(pattern) => result.push(pattern),
                Err(e) => tracing::warn!("Skipping corrupt pattern {}: {}", signature, e),
            }
        }
        Ok(result)
    }

    fn replace_patterns(
        tx: &Transaction<'_>,
        patterns: &[BehaviorPattern],
    ) -> Result<(), ForesightError> {
        tx.execute("DELETE FROM patterns", [])?;
        let mut stmt = tx.prepare(
            "INSERT INTO patterns (signature, id, kind, frequency, time_conditions, conditions,
                                   action_kinds, confidence, last_updated)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )?;
        for p in patterns {
            stmt.execute(params![
                p.signature,
                p.id,
                p.kind.as_str(),
                p.frequency,
                serde_json::to_string(&p.time_conditions)?,
                serde_json::to_string(&p.conditions)?,
                serde_json::to_string(&p.action_kinds)?,
                p.confidence,
                format_timestamp(p.last_updated),
            ])?;
        }
        Ok(())
    }

    // -- Merge marker --

    fn query_marker(conn: &Connection) -> Result<Option<MergeMarker>, ForesightError> {
        let raw: Option<String> = conn
            .query_row(
                "SELECT value FROM engine_meta WHERE key = ?1",
                params![MERGE_MARKER_KEY],
                |r| r.get(0),
            )
            .optional()?;
        Ok(raw.and_then(|raw| match serde_json::from_str(&raw) {
            Ok(marker) => Some(marker),
            Err(e) => {
                tracing::warn!("Ignoring corrupt merge marker: {}", e);
                None
            }
        }))
    }

    fn write_marker(
        tx: &Transaction<'_>,
        marker: Option<&MergeMarker>,
    ) -> Result<(), ForesightError> {
        match marker {
            Some(marker) => {
                tx.execute(
                    "INSERT OR REPLACE INTO engine_meta (key, value) VALUES (?1, ?2)",
                    params![MERGE_MARKER_KEY, serde_json::to_string(marker)?],
                )?;
            }
            None => {
                tx.execute(
                    "DELETE FROM engine_meta WHERE key = ?1",
                    params![MERGE_MARKER_KEY],
                )?;
            }
        }
        Ok(())
    }
}

impl StorageAdapter for SqliteStorage {
    fn load(&self) -> Result<PersistedState, ForesightError> {
        let conn = self.lock()?;
        Ok(PersistedState {
            actions: Self::query_actions(&conn)?,
            patterns: Self::query_patterns(&conn)?,
            marker: Self::query_marker(&conn)?,
        })
    }

    fn append_action(&self, action: &Action, retain: usize) -> Result<(), ForesightError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        Self::insert_action(&tx, action)?;
        tx.execute(
            "DELETE FROM actions WHERE seq NOT IN
             (SELECT seq FROM actions ORDER BY seq DESC LIMIT ?1)",
            params![retain as i64],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn save_patterns(
        &self,
        patterns: &[BehaviorPattern],
        marker: Option<&MergeMarker>,
    ) -> Result<(), ForesightError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        Self::replace_patterns(&tx, patterns)?;
        Self::write_marker(&tx, marker)?;
        tx.commit()?;
        Ok(())
    }

    fn save(
        &self,
        actions: &[Action],
        patterns: &[BehaviorPattern],
        marker: Option<&MergeMarker>,
    ) -> Result<(), ForesightError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM actions", [])?;
        for action in actions {
            Self::insert_action(&tx, action)?;
        }
        Self::replace_patterns(&tx, patterns)?;
        Self::write_marker(&tx, marker)?;
        tx.commit()?;
        Ok(())
    }

    fn clear(&self) -> Result<(), ForesightError> {
        let conn = self.lock()?;
        conn.execute_batch(
            "DELETE FROM actions; DELETE FROM patterns; DELETE FROM engine_meta;",
        )?;
        Ok(())
    }
}

fn decode_action(
    id: String,
    kind: &str,
    payload: &str,
    occurred_at: &str,
    context: &str,
) -> Result<Action, ForesightError> {
    let kind = ActionKind::parse(kind).ok_or_else(|| ForesightError::CorruptRecord {
        id: id.clone(),
        message: format!("unknown action kind '{kind}'"),
    })?;
    Ok(Action {
        occurred_at: parse_timestamp(&id, occurred_at)?,
        kind,
        payload: serde_json::from_str(payload)?,
        context: serde_json::from_str(context)?,
        id,
    })
}

/// Raw row from the `patterns` table.
struct PatternRow {
    signature: String,
    id: String,
    kind: String,
    frequency: u32,
    time_conditions: String,
    conditions: String,
    action_kinds: String,
    confidence: f64,
    last_updated: String,
}

impl PatternRow {
    fn into_pattern(self) -> Result<BehaviorPattern, ForesightError> {
        let kind = PatternKind::parse(&self.kind).ok_or_else(|| ForesightError::CorruptRecord {
            id: self.id.clone(),
            message: format!("unknown pattern kind '{}'", self.kind),
        })?;
        Ok(BehaviorPattern {
            last_updated: parse_timestamp(&self.id, &self.last_updated)?,
            time_conditions: serde_json::from_str(&self.time_conditions)?,
            conditions: serde_json::from_str(&self.conditions)?,
            action_kinds: serde_json::from_str(&self.action_kinds)?,
            kind,
            id: self.id,
            signature: self.signature,
            frequency: self.frequency,
            confidence: self.confidence,
        })
    }
}

/// RFC 3339 with nanoseconds so timestamps round-trip exactly.
fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(id: &str, s: &str) -> Result<DateTime<Utc>, ForesightError> {
    DateTime::parse_from_rfc3339(s)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| ForesightError::CorruptRecord {
            id: id.to_string(),
            message: format!("bad timestamp '{s}': {e}"),
        })
}
