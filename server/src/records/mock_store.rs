//! Mock implementation of RecordStorage trait for testing

use crate::error::{GatewayError, GatewayResult, ResourceKind};
use crate::records::{Properties, RecordStorage, StoredEntity, Version};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

struct MockRow {
    properties: Properties,
    version: Version,
    revision: u64,
    last_modified: DateTime<Utc>,
}

type Table = BTreeMap<(String, String), MockRow>;

/// In-memory RecordStorage, useful for testing without disk I/O
pub struct MockRecordStore {
    tables: Arc<Mutex<HashMap<String, Table>>>,
}

impl MockRecordStore {
    pub fn new() -> Self {
        Self {
            tables: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Clear all tables and their records
    pub fn clear(&self) {
        if let Ok(mut tables) = self.tables.lock() {
            tables.clear();
        }
    }

    /// Number of records in a table (0 if the table does not exist)
    pub fn record_count(&self, table: &str) -> usize {
        self.tables
            .lock()
            .map(|tables| tables.get(table).map(|t| t.len()).unwrap_or(0))
            .unwrap_or(0)
    }

    fn lock(&self) -> GatewayResult<MutexGuard<'_, HashMap<String, Table>>> {
        self.tables
            .lock()
            .map_err(|_| GatewayError::transient_msg("mock record store lock poisoned"))
    }
}

impl Default for MockRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

fn table_mut<'a>(tables: &'a mut HashMap<String, Table>, table: &str) -> GatewayResult<&'a mut Table> {
    tables
        .get_mut(table)
        .ok_or_else(|| GatewayError::not_found(ResourceKind::Table, table))
}

fn to_stored(key: &(String, String), row: &MockRow) -> StoredEntity {
    StoredEntity {
        partition_key: key.0.clone(),
        row_key: key.1.clone(),
        properties: row.properties.clone(),
        version: row.version.clone(),
        last_modified: row.last_modified,
    }
}

fn next_version(table: &str, key: &(String, String), properties: &Properties, revision: u64) -> GatewayResult<Version> {
    let body = serde_json::to_string(properties)?;
    Ok(Version::derive(table, &key.0, &key.1, &body, revision))
}

#[async_trait]
impl RecordStorage for MockRecordStore {
    async fn create_table_if_not_exists(&self, table: &str) -> GatewayResult<bool> {
        let mut tables = self.lock()?;
        if tables.contains_key(table) {
            return Ok(false);
        }
        tables.insert(table.to_string(), Table::new());
        Ok(true)
    }

    async fn table_exists(&self, table: &str) -> GatewayResult<bool> {
        Ok(self.lock()?.contains_key(table))
    }

    async fn list_tables(&self) -> GatewayResult<Vec<String>> {
        let mut names: Vec<String> = self.lock()?.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn query_all(&self, table: &str) -> GatewayResult<Vec<StoredEntity>> {
        let mut tables = self.lock()?;
        let rows = table_mut(&mut tables, table)?;
        Ok(rows.iter().map(|(key, row)| to_stored(key, row)).collect())
    }

    async fn get_entity(&self, table: &str, partition_key: &str, row_key: &str) -> GatewayResult<Option<StoredEntity>> {
        let mut tables = self.lock()?;
        let rows = table_mut(&mut tables, table)?;
        let key = (partition_key.to_string(), row_key.to_string());
        Ok(rows.get(&key).map(|row| to_stored(&key, row)))
    }

    async fn insert_entity(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
        properties: Properties,
    ) -> GatewayResult<StoredEntity> {
        let mut tables = self.lock()?;
        let rows = table_mut(&mut tables, table)?;
        let key = (partition_key.to_string(), row_key.to_string());
        if rows.contains_key(&key) {
            return Err(GatewayError::Conflict {
                table: table.to_string(),
                partition_key: key.0,
                row_key: key.1,
            });
        }

        let row = MockRow {
            version: next_version(table, &key, &properties, 1)?,
            properties,
            revision: 1,
            last_modified: Utc::now(),
        };
        let stored = to_stored(&key, &row);
        rows.insert(key, row);
        Ok(stored)
    }

    async fn update_entity(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
        properties: Properties,
        if_match: &Version,
    ) -> GatewayResult<StoredEntity> {
        let mut tables = self.lock()?;
        let rows = table_mut(&mut tables, table)?;
        let key = (partition_key.to_string(), row_key.to_string());
        let row = rows.get_mut(&key).ok_or_else(|| {
            GatewayError::not_found(ResourceKind::Record, format!("{}/{}/{}", table, partition_key, row_key))
        })?;

        if !if_match.matches(&row.version) {
            return Err(GatewayError::VersionConflict {
                table: table.to_string(),
                partition_key: key.0,
                row_key: key.1,
            });
        }

        row.revision += 1;
        row.version = next_version(table, &key, &properties, row.revision)?;
        row.properties = properties;
        row.last_modified = Utc::now();
        Ok(to_stored(&key, row))
    }

    async fn delete_entity(&self, table: &str, partition_key: &str, row_key: &str) -> GatewayResult<bool> {
        let mut tables = self.lock()?;
        let rows = table_mut(&mut tables, table)?;
        Ok(rows
            .remove(&(partition_key.to_string(), row_key.to_string()))
            .is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_mock_record_store_basic_operations() {
        let store = MockRecordStore::new();
        store.create_table_if_not_exists("Orders").await.unwrap();
        assert_eq!(store.record_count("Orders"), 0);

        let props = json!({"Status": "Pending"}).as_object().cloned().unwrap();
        let inserted = store.insert_entity("Orders", "Orders", "o1", props.clone()).await.unwrap();
        assert_eq!(store.record_count("Orders"), 1);

        let duplicate = store.insert_entity("Orders", "Orders", "o1", props.clone()).await;
        assert!(duplicate.unwrap_err().is_conflict());

        let updated = store
            .update_entity("Orders", "Orders", "o1", props.clone(), &inserted.version)
            .await
            .unwrap();
        assert_ne!(updated.version, inserted.version);

        store.clear();
        assert_eq!(store.record_count("Orders"), 0);
        assert!(!store.table_exists("Orders").await.unwrap());
    }

    #[tokio::test]
    async fn test_mock_record_store_update_missing_record() {
        let store = MockRecordStore::new();
        store.create_table_if_not_exists("Orders").await.unwrap();
        let result = store
            .update_entity("Orders", "Orders", "nope", Properties::new(), &Version::any())
            .await;
        assert!(result.unwrap_err().is_not_found());
    }
}
