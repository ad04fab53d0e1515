//! Run Artifact Storage (§6): SQLite-based immutable storage for finished
//! run results. WAL pragmas, schema-version bookkeeping, and an
//! "insert once, never update" discipline — no publication or trust-gate
//! machinery, this engine only ever persists finished runs.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::engine::aggregator::CallerLeaderboard;
use crate::engine::manifest::RunManifest;
use crate::engine::model::metrics_types::{PathMetrics, PolicyResult};
use crate::engine::model::run_id::RunId;

const SCHEMA_VERSION: u32 = 1;

/// Everything produced by one run, persisted together under its `run_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunArtifact {
    pub manifest: RunManifest,
    pub path_metrics: Vec<PathMetrics>,
    pub policy_results: Vec<PolicyResult>,
    pub leaderboard: Option<CallerLeaderboard>,
}

pub struct ArtifactStore {
    conn: Arc<Mutex<Connection>>,
}

impl ArtifactStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ArtifactStoreError> {
        let conn = Connection::open(path)?;
        let store = Self { conn: Arc::new(Mutex::new(conn)) };
        store.initialize_schema()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self, ArtifactStoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn: Arc::new(Mutex::new(conn)) };
        store.initialize_schema()?;
        Ok(store)
    }

    fn initialize_schema(&self) -> Result<(), ArtifactStoreError> {
        let conn = self.conn.lock();
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY);
            CREATE TABLE IF NOT EXISTS run_artifacts (
                run_id TEXT PRIMARY KEY,
                started_at INTEGER NOT NULL,
                finished_at INTEGER NOT NULL,
                slice_hash TEXT NOT NULL,
                policy_hash TEXT NOT NULL,
                calls_hash TEXT NOT NULL,
                artifact_blob BLOB NOT NULL
            ) WITHOUT ROWID;
            CREATE INDEX IF NOT EXISTS idx_artifacts_finished ON run_artifacts(finished_at DESC);
            "#,
        )?;
        let version: Option<u32> =
            conn.query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0)).optional()?;
        if version.is_none() {
            conn.execute("INSERT INTO schema_version (version) VALUES (?)", params![SCHEMA_VERSION])?;
            info!("created artifact store schema v{SCHEMA_VERSION}");
        }
        Ok(())
    }

    /// Persist a run artifact. Errors if `run_id` is already present —
    /// artifacts are content-addressed and immutable once written.
    pub fn persist(&self, artifact: &RunArtifact) -> Result<(), ArtifactStoreError> {
        let run_id = artifact.manifest.run_id.as_string();
        if self.exists(&artifact.manifest.run_id)? {
            return Err(ArtifactStoreError::AlreadyExists(run_id));
        }
        let blob = serde_json::to_vec(artifact)?;
        let conn = self.conn.lock();
        conn.execute(
            r#"INSERT INTO run_artifacts
                (run_id, started_at, finished_at, slice_hash, policy_hash, calls_hash, artifact_blob)
                VALUES (?, ?, ?, ?, ?, ?, ?)"#,
            params![
                run_id,
                artifact.manifest.started_at,
                artifact.manifest.finished_at,
                artifact.manifest.inputs.slice,
                artifact.manifest.inputs.policy,
                artifact.manifest.inputs.calls,
                blob,
            ],
        )?;
        debug!("persisted run artifact {run_id}");
        Ok(())
    }

    pub fn exists(&self, run_id: &RunId) -> Result<bool, ArtifactStoreError> {
        let conn = self.conn.lock();
        let found: Option<i32> = conn
            .query_row("SELECT 1 FROM run_artifacts WHERE run_id = ?", [run_id.as_string()], |_| Ok(1))
            .optional()?;
        Ok(found.is_some())
    }

    pub fn get(&self, run_id: &RunId) -> Result<Option<RunArtifact>, ArtifactStoreError> {
        let conn = self.conn.lock();
        let blob: Option<Vec<u8>> = conn
            .query_row("SELECT artifact_blob FROM run_artifacts WHERE run_id = ?", [run_id.as_string()], |row| row.get(0))
            .optional()?;
        match blob {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Most recent `limit` run ids, newest first.
    pub fn recent_run_ids(&self, limit: usize) -> Result<Vec<String>, ArtifactStoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT run_id FROM run_artifacts ORDER BY finished_at DESC LIMIT ?")?;
        let rows = stmt.query_map(params![limit as i64], |row| row.get(0))?;
        rows.collect::<Result<Vec<String>, _>>().map_err(ArtifactStoreError::from)
    }
}

#[derive(Debug)]
pub enum ArtifactStoreError {
    Sqlite(rusqlite::Error),
    Serialization(serde_json::Error),
    AlreadyExists(String),
}

impl std::fmt::Display for ArtifactStoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(e) => write!(f, "sqlite error: {e}"),
            Self::Serialization(e) => write!(f, "serialization error: {e}"),
            Self::AlreadyExists(id) => write!(f, "artifact already exists: {id}"),
        }
    }
}

impl std::error::Error for ArtifactStoreError {}

impl From<rusqlite::Error> for ArtifactStoreError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Sqlite(e)
    }
}

impl From<serde_json::Error> for ArtifactStoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e)
    }
}
