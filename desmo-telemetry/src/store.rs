// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use desmo_common::MutexExt;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// A persisted batch awaiting upload.
///
/// Rows are immutable except for `attempt_count`; they disappear only on
/// upload success, permanent rejection, or stale eviction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingBatch {
    pub id: i64,
    pub session_id: String,
    pub samples_json: String,
    pub sample_count: u32,
    pub created_at_ms: i64,
    pub attempt_count: u32,
}

/// Append-only batch table, shared by every session for retry continuity.
///
/// The connection is serialised behind a mutex; each operation is a single
/// statement and therefore its own transaction.
#[derive(Debug)]
pub struct PendingBatchStore {
    conn: Mutex<Connection>,
}

impl PendingBatchStore {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Volatile store for tests and the scripted fakes.
    pub fn open_in_memory() -> anyhow::Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> anyhow::Result<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS pending_telemetry (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                samples_json TEXT NOT NULL,
                sample_count INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                attempt_count INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_pending_session ON pending_telemetry(session_id);
            CREATE INDEX IF NOT EXISTS idx_pending_created ON pending_telemetry(created_at);
        "#,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn insert(
        &self,
        session_id: &str,
        samples_json: &str,
        sample_count: u32,
    ) -> anyhow::Result<i64> {
        let conn = self.conn.lock_or_panic();
        conn.execute(
            "INSERT INTO pending_telemetry (session_id, samples_json, sample_count, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![session_id, samples_json, sample_count, now_ms()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Every pending row, oldest first.
    pub fn all_pending(&self) -> anyhow::Result<Vec<PendingBatch>> {
        self.select(
            "SELECT id, session_id, samples_json, sample_count, created_at, attempt_count
             FROM pending_telemetry ORDER BY created_at ASC, id ASC",
            params![],
        )
    }

    /// Pending rows for one session, oldest first.
    pub fn pending_for(&self, session_id: &str) -> anyhow::Result<Vec<PendingBatch>> {
        self.select(
            "SELECT id, session_id, samples_json, sample_count, created_at, attempt_count
             FROM pending_telemetry WHERE session_id = ?1 ORDER BY created_at ASC, id ASC",
            params![session_id],
        )
    }

    fn select(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> anyhow::Result<Vec<PendingBatch>> {
        let conn = self.conn.lock_or_panic();
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, |row| {
            Ok(PendingBatch {
                id: row.get(0)?,
                session_id: row.get(1)?,
                samples_json: row.get(2)?,
                sample_count: row.get(3)?,
                created_at_ms: row.get(4)?,
                attempt_count: row.get(5)?,
            })
        })?;

        let mut batches = Vec::new();
        for row in rows {
            batches.push(row?);
        }
        Ok(batches)
    }

    /// Idempotent: deleting a row that is already gone is not an error.
    pub fn delete(&self, id: i64) -> anyhow::Result<()> {
        self.conn
            .lock_or_panic()
            .execute("DELETE FROM pending_telemetry WHERE id = ?1", params![id])?;
        Ok(())
    }

    pub fn increment_attempts(&self, id: i64) -> anyhow::Result<()> {
        self.conn.lock_or_panic().execute(
            "UPDATE pending_telemetry SET attempt_count = attempt_count + 1 WHERE id = ?1",
            params![id],
        )?;
        Ok(())
    }

    /// Delete every row whose attempt count has reached `max_attempts`.
    /// Returns how many rows were evicted.
    pub fn evict_stale(&self, max_attempts: u32) -> anyhow::Result<usize> {
        let evicted = self.conn.lock_or_panic().execute(
            "DELETE FROM pending_telemetry WHERE attempt_count >= ?1",
            params![max_attempts],
        )?;
        Ok(evicted)
    }

    pub fn count(&self) -> anyhow::Result<usize> {
        let conn = self.conn.lock_or_panic();
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM pending_telemetry", [], |row| {
                row.get(0)
            })?;
        Ok(count as usize)
    }
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
