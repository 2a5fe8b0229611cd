//! Shared SQLite connection handle for the record and queue backends

use crate::error::{GatewayError, GatewayResult};
use chrono::{DateTime, SecondsFormat, Utc};
use log::info;
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// One long-lived connection, shared by every caller. Statements run on the
/// blocking thread pool so async callers are never stalled on disk I/O.
#[derive(Clone)]
pub struct SqliteHandle {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteHandle {
    /// Open (or create) a database file, creating its parent directory
    pub fn open(path: &Path, wal_mode: bool) -> GatewayResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        if wal_mode {
            conn.pragma_update(None, "journal_mode", "WAL")?;
        }
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        info!("Opened SQLite database at {}", path.display());
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn in_memory() -> GatewayResult<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool
    pub async fn run<F, R>(&self, f: F) -> GatewayResult<R>
    where
        F: FnOnce(&mut Connection) -> GatewayResult<R> + Send + 'static,
        R: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| GatewayError::transient_msg("sqlite connection lock poisoned"))?;
            f(&mut guard)
        })
        .await?
    }

    /// Run `f` synchronously; used for schema setup before the runtime is involved
    pub fn run_blocking<F, R>(&self, f: F) -> GatewayResult<R>
    where
        F: FnOnce(&mut Connection) -> GatewayResult<R>,
    {
        let mut guard = self
            .conn
            .lock()
            .map_err(|_| GatewayError::transient_msg("sqlite connection lock poisoned"))?;
        f(&mut guard)
    }
}

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub fn parse_timestamp(raw: &str) -> GatewayResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| GatewayError::transient(format!("corrupt timestamp {:?}", raw), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_round_trip_keeps_nanos() {
        let now = Utc::now();
        assert_eq!(parse_timestamp(&format_timestamp(&now)).unwrap(), now);
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[tokio::test]
    async fn test_run_executes_on_connection() {
        let handle = SqliteHandle::in_memory().unwrap();
        let value: i64 = handle
            .run(|conn| Ok(conn.query_row("SELECT 40 + 2", [], |row| row.get(0))?))
            .await
            .unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_open_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("records.db");
        SqliteHandle::open(&path, true).unwrap();
        assert!(path.exists());
    }
}
