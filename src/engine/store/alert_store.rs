//! Alert Store (§6, component B): reads historical calls from the
//! canonical view `canon.alerts_std` in an embedded analytical database.

use async_trait::async_trait;

use crate::engine::errors::BacktestError;
use crate::engine::model::call::{Call, TokenRef};
use crate::engine::time::UnixMs;

#[derive(Debug, Clone, Default)]
pub struct AlertQuery {
    pub from: UnixMs,
    pub to: UnixMs,
    pub caller: Option<String>,
    pub limit: Option<usize>,
}

#[async_trait]
pub trait AlertStore: Send + Sync {
    async fn query_calls(&self, query: &AlertQuery) -> Result<Vec<Call>, BacktestError>;
}

/// Reads calls from a `rusqlite` database file expected to expose a
/// `canon.alerts_std` view. Missing-view failures surface the view name
/// and database path per §6.
pub struct SqliteAlertStore {
    conn: parking_lot::Mutex<rusqlite::Connection>,
    db_path: String,
}

impl SqliteAlertStore {
    pub fn open(db_path: impl Into<String>) -> Result<Self, BacktestError> {
        let db_path = db_path.into();
        let conn = rusqlite::Connection::open(&db_path)?;
        let view_exists: bool = conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type IN ('view','table') AND name = 'alerts_std'",
                [],
                |row| row.get::<_, i64>(0).map(|c| c > 0),
            )
            .unwrap_or(false);
        if !view_exists {
            return Err(BacktestError::Configuration(format!(
                "canonical view 'canon.alerts_std' not found in alert store at {db_path}"
            )));
        }
        Ok(Self { conn: parking_lot::Mutex::new(conn), db_path })
    }

    pub fn db_path(&self) -> &str {
        &self.db_path
    }
}

#[async_trait]
impl AlertStore for SqliteAlertStore {
    async fn query_calls(&self, query: &AlertQuery) -> Result<Vec<Call>, BacktestError> {
        let conn = self.conn.lock();
        let mut sql = String::from(
            "SELECT call_id, caller, token_address, chain, call_timestamp FROM alerts_std WHERE call_timestamp >= ?1 AND call_timestamp <= ?2",
        );
        if query.caller.is_some() {
            sql.push_str(" AND caller = ?3");
        }
        sql.push_str(" ORDER BY call_timestamp ASC, call_id ASC");
        if let Some(limit) = query.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        let mut stmt = conn.prepare(&sql)?;
        let rows = if let Some(caller) = &query.caller {
            stmt.query_map(rusqlite::params![query.from, query.to, caller], row_to_call)?
                .collect::<Result<Vec<_>, _>>()?
        } else {
            stmt.query_map(rusqlite::params![query.from, query.to], row_to_call)?
                .collect::<Result<Vec<_>, _>>()?
        };
        Ok(rows)
    }
}

fn row_to_call(row: &rusqlite::Row) -> rusqlite::Result<Call> {
    Ok(Call::new(
        row.get::<_, String>(0)?,
        row.get::<_, String>(1)?,
        TokenRef::new(row.get::<_, String>(2)?, row.get::<_, String>(3)?),
        row.get::<_, i64>(4)?,
    ))
}

/// In-memory alert store used by tests and one-shot CLI invocations.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAlertStore {
    calls: Vec<Call>,
}

impl InMemoryAlertStore {
    pub fn new(calls: Vec<Call>) -> Self {
        Self { calls }
    }
}

#[async_trait]
impl AlertStore for InMemoryAlertStore {
    async fn query_calls(&self, query: &AlertQuery) -> Result<Vec<Call>, BacktestError> {
        let mut out: Vec<Call> = self
            .calls
            .iter()
            .filter(|c| c.call_timestamp >= query.from && c.call_timestamp <= query.to)
            .filter(|c| query.caller.as_deref().map_or(true, |caller| c.caller == caller))
            .cloned()
            .collect();
        out.sort_by(|a, b| (a.call_timestamp, &a.call_id).cmp(&(b.call_timestamp, &b.call_id)));
        if let Some(limit) = query.limit {
            out.truncate(limit);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(id: &str, ts: UnixMs) -> Call {
        Call::new(id, "alice", TokenRef::new("0xabc", "solana"), ts)
    }

    #[tokio::test]
    async fn test_in_memory_filters_by_range_and_sorts() {
        let store = InMemoryAlertStore::new(vec![call("c2", 200), call("c1", 100), call("c3", 300)]);
        let query = AlertQuery { from: 100, to: 250, caller: None, limit: None };
        let got = store.query_calls(&query).await.unwrap();
        assert_eq!(got.iter().map(|c| c.call_id.as_str()).collect::<Vec<_>>(), vec!["c1", "c2"]);
    }

    #[tokio::test]
    async fn test_in_memory_respects_limit() {
        let store = InMemoryAlertStore::new(vec![call("c1", 100), call("c2", 200)]);
        let query = AlertQuery { from: 0, to: 1000, caller: None, limit: Some(1) };
        let got = store.query_calls(&query).await.unwrap();
        assert_eq!(got.len(), 1);
    }
}
