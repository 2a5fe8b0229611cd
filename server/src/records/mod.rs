//! Structured Record Storage Layer
//!
//! Records are schemaless property bags addressed by a two-part key
//! (partition key, row key) inside a named table. Typed business records
//! implement [`Record`] and are converted to and from [`StoredEntity`] by the
//! gateway, so every backend only ever deals with JSON property maps.

pub mod config;
pub mod mock_store;
pub mod sqlite_store;


use crate::error::GatewayResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Schemaless property bag of a stored record
pub type Properties = serde_json::Map<String, serde_json::Value>;

const ANY_VERSION: &str = "*";

/// Opaque concurrency token assigned by the store on every write
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(String);

impl Version {
    pub fn new(token: impl Into<String>) -> Self {
        Version(token.into())
    }

    /// Wildcard that matches whatever version is stored
    pub fn any() -> Self {
        Version(ANY_VERSION.to_string())
    }

    pub fn is_any(&self) -> bool {
        self.0 == ANY_VERSION
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Derive the token for a write. A fresh nonce is mixed in, so no two
    /// writes share a token, not even a re-insert after delete with the same
    /// properties and revision.
    pub fn derive(table: &str, partition_key: &str, row_key: &str, properties: &str, revision: u64) -> Self {
        let nonce = uuid::Uuid::new_v4().simple().to_string();
        let input = format!(
            "{}\0{}\0{}\0{}\0{}\0{}",
            table, partition_key, row_key, properties, revision, nonce
        );
        let digest = md5::compute(input.as_bytes());
        Version(format!("W/\"{}\"", hex::encode(digest.0)))
    }

    /// Whether a stored version satisfies this precondition
    pub fn matches(&self, stored: &Version) -> bool {
        self.is_any() || self == stored
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Addressing and store-assigned fields carried by every record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityMeta {
    pub partition_key: String,
    pub row_key: String,
    pub version: Option<Version>,
    pub last_modified: Option<DateTime<Utc>>,
}

impl EntityMeta {
    pub fn new(partition_key: impl Into<String>, row_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            row_key: row_key.into(),
            version: None,
            last_modified: None,
        }
    }
}

/// A record as the backends see it
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEntity {
    pub partition_key: String,
    pub row_key: String,
    pub properties: Properties,
    pub version: Version,
    pub last_modified: DateTime<Utc>,
}

/// A typed business record.
///
/// Implementors keep their [`EntityMeta`] out of serde (`#[serde(skip)]`);
/// the serialized form of the type is its property bag.
pub trait Record: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Name of the table this record type lives in
    fn table_name() -> Cow<'static, str> {
        Cow::Owned(default_table_name::<Self>())
    }

    fn meta(&self) -> &EntityMeta;

    fn meta_mut(&mut self) -> &mut EntityMeta;

    fn partition_key(&self) -> &str {
        &self.meta().partition_key
    }

    fn row_key(&self) -> &str {
        &self.meta().row_key
    }

    fn version(&self) -> Option<&Version> {
        self.meta().version.as_ref()
    }
}

/// Pluralised type name, used for record types without an explicit table
pub fn default_table_name<T: ?Sized>() -> String {
    let full = std::any::type_name::<T>();
    let without_generics = full.split('<').next().unwrap_or(full);
    let short = without_generics.rsplit("::").next().unwrap_or(without_generics);
    format!("{}s", short)
}

/// Serialize a record into its property bag
pub fn to_properties<T: Record>(record: &T) -> GatewayResult<Properties> {
    match serde_json::to_value(record)? {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(crate::error::GatewayError::invalid(format!(
            "record of table {} must serialize to an object, got {}",
            T::table_name(),
            other
        ))),
    }
}

/// Rebuild a typed record from a stored entity
pub fn from_stored<T: Record>(entity: StoredEntity) -> GatewayResult<T> {
    let mut record: T = serde_json::from_value(serde_json::Value::Object(entity.properties))?;
    *record.meta_mut() = EntityMeta {
        partition_key: entity.partition_key,
        row_key: entity.row_key,
        version: Some(entity.version),
        last_modified: Some(entity.last_modified),
    };
    Ok(record)
}

/// Trait defining the structured record storage interface
#[async_trait]
pub trait RecordStorage: Send + Sync {
    /// Create a table; returns `true` when it did not exist before
    async fn create_table_if_not_exists(&self, table: &str) -> GatewayResult<bool>;

    async fn table_exists(&self, table: &str) -> GatewayResult<bool>;

    async fn list_tables(&self) -> GatewayResult<Vec<String>>;

    /// Every record of a table, in no particular order
    async fn query_all(&self, table: &str) -> GatewayResult<Vec<StoredEntity>>;

    async fn get_entity(&self, table: &str, partition_key: &str, row_key: &str) -> GatewayResult<Option<StoredEntity>>;

    /// Insert a new record; `Conflict` if the key pair is taken
    async fn insert_entity(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
        properties: Properties,
    ) -> GatewayResult<StoredEntity>;

    /// Replace a record's properties if its stored version satisfies `if_match`
    async fn update_entity(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
        properties: Properties,
        if_match: &Version,
    ) -> GatewayResult<StoredEntity>;

    /// Delete a record; returns whether it existed
    async fn delete_entity(&self, table: &str, partition_key: &str, row_key: &str) -> GatewayResult<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct Supplier {
        #[serde(skip)]
        meta: EntityMeta,
        name: String,
    }

    impl Record for Supplier {
        fn meta(&self) -> &EntityMeta {
            &self.meta
        }

        fn meta_mut(&mut self) -> &mut EntityMeta {
            &mut self.meta
        }
    }

    #[test]
    fn test_default_table_name_is_pluralised() {
        assert_eq!(Supplier::table_name(), "Suppliers");
    }

    #[test]
    fn test_version_unique_per_write() {
        let v1 = Version::derive("Customers", "Customers", "c1", "{}", 1);
        let v2 = Version::derive("Customers", "Customers", "c1", "{}", 2);
        assert_ne!(v1, v2);
        assert_ne!(v1, Version::derive("Customers", "Customers", "c1", "{}", 1));
        assert!(v1.as_str().starts_with("W/\""));
    }

    #[test]
    fn test_wildcard_matches_everything() {
        let stored = Version::derive("Orders", "Orders", "o1", "{}", 7);
        assert!(Version::any().matches(&stored));
        assert!(stored.matches(&stored));
        assert!(!Version::new("W/\"stale\"").matches(&stored));
    }

    #[test]
    fn test_properties_exclude_meta() {
        let supplier = Supplier {
            meta: EntityMeta::new("Suppliers", "s1"),
            name: "Acme".into(),
        };
        let props = to_properties(&supplier).unwrap();
        assert_eq!(props.len(), 1);
        assert_eq!(props.get("name").and_then(|v| v.as_str()), Some("Acme"));

        let now = Utc::now();
        let stored = StoredEntity {
            partition_key: "Suppliers".into(),
            row_key: "s1".into(),
            properties: props,
            version: Version::new("W/\"abc\""),
            last_modified: now,
        };
        let back: Supplier = from_stored(stored).unwrap();
        assert_eq!(back.name, "Acme");
        assert_eq!(back.meta.row_key, "s1");
        assert_eq!(back.meta.version, Some(Version::new("W/\"abc\"")));
        assert_eq!(back.meta.last_modified, Some(now));
    }
}
