//! SQLite implementation of the RecordStorage trait

use crate::error::{GatewayError, GatewayResult, ResourceKind};
use crate::records::{Properties, RecordStorage, StoredEntity, Version};
use crate::sqlite::{format_timestamp, parse_timestamp, SqliteHandle};
use async_trait::async_trait;
use chrono::Utc;
use log::{debug, info, warn};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS record_tables (
        name TEXT PRIMARY KEY,
        created_at TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS records (
        table_name TEXT NOT NULL,
        partition_key TEXT NOT NULL,
        row_key TEXT NOT NULL,
        properties TEXT NOT NULL,
        version TEXT NOT NULL,
        revision INTEGER NOT NULL,
        last_modified TEXT NOT NULL,
        PRIMARY KEY (table_name, partition_key, row_key)
    );
";

/// SQLite implementation of RecordStorage. All tables share one physical
/// `records` table, discriminated by `table_name`.
pub struct SQLiteRecordStore {
    db: SqliteHandle,
}

impl SQLiteRecordStore {
    pub fn open(path: &Path, wal_mode: bool) -> GatewayResult<Self> {
        Self::with_handle(SqliteHandle::open(path, wal_mode)?)
    }

    pub fn in_memory() -> GatewayResult<Self> {
        Self::with_handle(SqliteHandle::in_memory()?)
    }

    fn with_handle(db: SqliteHandle) -> GatewayResult<Self> {
        db.run_blocking(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })?;
        Ok(Self { db })
    }
}

fn record_name(table: &str, partition_key: &str, row_key: &str) -> String {
    format!("{}/{}/{}", table, partition_key, row_key)
}

fn require_table(conn: &Connection, table: &str) -> GatewayResult<()> {
    let exists: Option<i64> = conn
        .query_row("SELECT 1 FROM record_tables WHERE name = ?1", params![table], |row| row.get(0))
        .optional()?;
    match exists {
        Some(_) => Ok(()),
        None => Err(GatewayError::not_found(ResourceKind::Table, table)),
    }
}

type RawRow = (String, String, String, String, String);

fn decode_row(raw: RawRow) -> GatewayResult<StoredEntity> {
    let (partition_key, row_key, properties, version, last_modified) = raw;
    let properties: Properties = serde_json::from_str(&properties)?;
    Ok(StoredEntity {
        partition_key,
        row_key,
        properties,
        version: Version::new(version),
        last_modified: parse_timestamp(&last_modified)?,
    })
}

fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _) if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

#[async_trait]
impl RecordStorage for SQLiteRecordStore {
    async fn create_table_if_not_exists(&self, table: &str) -> GatewayResult<bool> {
        let table = table.to_string();
        self.db
            .run(move |conn| {
                let changed = conn.execute(
                    "INSERT OR IGNORE INTO record_tables (name, created_at) VALUES (?1, ?2)",
                    params![table, format_timestamp(&Utc::now())],
                )?;
                if changed > 0 {
                    info!("Created table {}", table);
                }
                Ok(changed > 0)
            })
            .await
    }

    async fn table_exists(&self, table: &str) -> GatewayResult<bool> {
        let table = table.to_string();
        self.db
            .run(move |conn| match require_table(conn, &table) {
                Ok(()) => Ok(true),
                Err(e) if e.is_not_found() => Ok(false),
                Err(e) => Err(e),
            })
            .await
    }

    async fn list_tables(&self) -> GatewayResult<Vec<String>> {
        self.db
            .run(|conn| {
                let mut stmt = conn.prepare("SELECT name FROM record_tables ORDER BY name")?;
                let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
                let mut tables = Vec::new();
                for row in rows {
                    tables.push(row?);
                }
                Ok(tables)
            })
            .await
    }

    async fn query_all(&self, table: &str) -> GatewayResult<Vec<StoredEntity>> {
        let table = table.to_string();
        self.db
            .run(move |conn| {
                require_table(conn, &table)?;
                let mut stmt = conn.prepare(
                    "SELECT partition_key, row_key, properties, version, last_modified
                     FROM records WHERE table_name = ?1",
                )?;
                let rows = stmt.query_map(params![table], |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
                })?;

                let mut entities = Vec::new();
                for row in rows {
                    entities.push(decode_row(row?)?);
                }
                debug!("Queried {} records from table {}", entities.len(), table);
                Ok(entities)
            })
            .await
    }

    async fn get_entity(&self, table: &str, partition_key: &str, row_key: &str) -> GatewayResult<Option<StoredEntity>> {
        let (table, pk, rk) = (table.to_string(), partition_key.to_string(), row_key.to_string());
        self.db
            .run(move |conn| {
                require_table(conn, &table)?;
                let raw: Option<RawRow> = conn
                    .query_row(
                        "SELECT partition_key, row_key, properties, version, last_modified
                         FROM records WHERE table_name = ?1 AND partition_key = ?2 AND row_key = ?3",
                        params![table, pk, rk],
                        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
                    )
                    .optional()?;
                raw.map(decode_row).transpose()
            })
            .await
    }

    async fn insert_entity(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
        properties: Properties,
    ) -> GatewayResult<StoredEntity> {
        let (table, pk, rk) = (table.to_string(), partition_key.to_string(), row_key.to_string());
        self.db
            .run(move |conn| {
                require_table(conn, &table)?;
                let body = serde_json::to_string(&properties)?;
                let revision = 1u64;
                let version = Version::derive(&table, &pk, &rk, &body, revision);
                let now = Utc::now();

                let inserted = conn.execute(
                    "INSERT INTO records
                        (table_name, partition_key, row_key, properties, version, revision, last_modified)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![table, pk, rk, body, version.as_str(), revision as i64, format_timestamp(&now)],
                );
                match inserted {
                    Ok(_) => {}
                    Err(e) if is_constraint_violation(&e) => {
                        return Err(GatewayError::Conflict {
                            table,
                            partition_key: pk,
                            row_key: rk,
                        });
                    }
                    Err(e) => return Err(e.into()),
                }

                debug!("Inserted record {}", record_name(&table, &pk, &rk));
                Ok(StoredEntity {
                    partition_key: pk,
                    row_key: rk,
                    properties,
                    version,
                    last_modified: now,
                })
            })
            .await
    }

    async fn update_entity(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
        properties: Properties,
        if_match: &Version,
    ) -> GatewayResult<StoredEntity> {
        let (table, pk, rk) = (table.to_string(), partition_key.to_string(), row_key.to_string());
        let if_match = if_match.clone();
        self.db
            .run(move |conn| {
                require_table(conn, &table)?;
                let tx = conn.transaction()?;
                let current: Option<(String, i64)> = tx
                    .query_row(
                        "SELECT version, revision FROM records
                         WHERE table_name = ?1 AND partition_key = ?2 AND row_key = ?3",
                        params![table, pk, rk],
                        |row| Ok((row.get(0)?, row.get(1)?)),
                    )
                    .optional()?;

                let (stored_version, revision) = match current {
                    Some(found) => found,
                    None => {
                        return Err(GatewayError::not_found(
                            ResourceKind::Record,
                            record_name(&table, &pk, &rk),
                        ))
                    }
                };

                if !if_match.matches(&Version::new(stored_version)) {
                    warn!("Version mismatch updating {}", record_name(&table, &pk, &rk));
                    return Err(GatewayError::VersionConflict {
                        table,
                        partition_key: pk,
                        row_key: rk,
                    });
                }

                let body = serde_json::to_string(&properties)?;
                let next_revision = revision as u64 + 1;
                let version = Version::derive(&table, &pk, &rk, &body, next_revision);
                let now = Utc::now();
                tx.execute(
                    "UPDATE records SET properties = ?1, version = ?2, revision = ?3, last_modified = ?4
                     WHERE table_name = ?5 AND partition_key = ?6 AND row_key = ?7",
                    params![body, version.as_str(), next_revision as i64, format_timestamp(&now), table, pk, rk],
                )?;
                tx.commit()?;

                debug!("Updated record {} to revision {}", record_name(&table, &pk, &rk), next_revision);
                Ok(StoredEntity {
                    partition_key: pk,
                    row_key: rk,
                    properties,
                    version,
                    last_modified: now,
                })
            })
            .await
    }

    async fn delete_entity(&self, table: &str, partition_key: &str, row_key: &str) -> GatewayResult<bool> {
        let (table, pk, rk) = (table.to_string(), partition_key.to_string(), row_key.to_string());
        self.db
            .run(move |conn| {
                require_table(conn, &table)?;
                let deleted = conn.execute(
                    "DELETE FROM records WHERE table_name = ?1 AND partition_key = ?2 AND row_key = ?3",
                    params![table, pk, rk],
                )?;
                Ok(deleted > 0)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props(value: serde_json::Value) -> Properties {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_sqlite_record_store_basic_operations() {
        let store = SQLiteRecordStore::in_memory().unwrap();
        assert!(store.create_table_if_not_exists("Customers").await.unwrap());
        assert!(!store.create_table_if_not_exists("Customers").await.unwrap());

        let inserted = store
            .insert_entity("Customers", "Customers", "c1", props(json!({"Email": "a@b.com"})))
            .await
            .unwrap();

        let fetched = store.get_entity("Customers", "Customers", "c1").await.unwrap().unwrap();
        assert_eq!(fetched, inserted);

        let updated = store
            .update_entity(
                "Customers",
                "Customers",
                "c1",
                props(json!({"Email": "new@b.com"})),
                &inserted.version,
            )
            .await
            .unwrap();
        assert_ne!(updated.version, inserted.version);

        let stale = store
            .update_entity("Customers", "Customers", "c1", props(json!({})), &inserted.version)
            .await;
        assert!(stale.unwrap_err().is_version_conflict());

        assert!(store.delete_entity("Customers", "Customers", "c1").await.unwrap());
        assert!(!store.delete_entity("Customers", "Customers", "c1").await.unwrap());
        assert!(store.get_entity("Customers", "Customers", "c1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sqlite_record_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.db");
        {
            let store = SQLiteRecordStore::open(&path, true).unwrap();
            store.create_table_if_not_exists("Products").await.unwrap();
            store
                .insert_entity("Products", "Products", "p1", props(json!({"Price": 9.5})))
                .await
                .unwrap();
        }

        let reopened = SQLiteRecordStore::open(&path, true).unwrap();
        assert!(reopened.table_exists("Products").await.unwrap());
        let all = reopened.query_all("Products").await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].properties.get("Price"), Some(&json!(9.5)));
    }

    #[tokio::test]
    async fn test_sqlite_record_store_missing_table() {
        let store = SQLiteRecordStore::in_memory().unwrap();
        let err = store.query_all("Ghosts").await.unwrap_err();
        assert!(err.is_not_found());
        assert!(!store.table_exists("Ghosts").await.unwrap());
    }
}
