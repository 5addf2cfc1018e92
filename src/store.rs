use crate::{config::BackendSettings, error::StoreError};
use serde_json::{Map, Value};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::{collections::BTreeMap, str::FromStr};

/// All attributes of an item, by name. Every attribute is a string.
pub type Item = BTreeMap<String, String>;

/// Primary key of an item: one or more named key attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key(BTreeMap<String, String>);

impl Key {
    pub fn new(name: &str, value: impl Into<String>) -> Self {
        Self(BTreeMap::from([(name.to_string(), value.into())]))
    }

    /// Adds a sort attribute, producing a composite key.
    pub fn and(mut self, name: &str, value: impl Into<String>) -> Self {
        self.0.insert(name.to_string(), value.into());
        self
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value.as_str()))
    }

    // canonical form, stable regardless of the order attributes were added in
    fn encode(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string(&self.0)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assignment {
    Set(String, String),
    Remove(String),
}

impl Assignment {
    pub fn set(name: &str, value: impl Into<String>) -> Self {
        Assignment::Set(name.to_string(), value.into())
    }

    pub fn remove(name: &str) -> Self {
        Assignment::Remove(name.to_string())
    }
}

/// Single-item key-value backend, addressed by logical table name.
///
/// Every call is one round trip: no caching, no retries.
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    /// Returns `None` when no item has `key`. With a projection, only the named
    /// attributes are returned, so an existing item may come back empty.
    async fn get(
        &self,
        table: &str,
        key: &Key,
        projection: Option<&[&str]>,
        consistent: bool,
    ) -> Result<Option<Item>, StoreError>;

    /// Applies every assignment to the item at `key` in one call, creating the
    /// item when absent.
    async fn upsert(
        &self,
        table: &str,
        key: &Key,
        assignments: &[Assignment],
    ) -> Result<(), StoreError>;
}

const CREATE_ITEMS: &str = "CREATE TABLE IF NOT EXISTS items (
    table_name TEXT NOT NULL,
    item_key TEXT NOT NULL,
    attributes TEXT NOT NULL,
    PRIMARY KEY (table_name, item_key)
)";

// json_patch treats null members as removals
const UPSERT_ITEM: &str = "INSERT INTO items (table_name, item_key, attributes)
    VALUES (?1, ?2, json_patch('{}', ?3))
    ON CONFLICT (table_name, item_key)
    DO UPDATE SET attributes = json_patch(items.attributes, ?3)";

#[derive(Debug, Clone)]
pub struct SqliteStore {
    sqlite_pool: SqlitePool,
    region: String,
}

impl SqliteStore {
    pub async fn connect(settings: &BackendSettings) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(&settings.database_url)?.create_if_missing(true);
        let pool_options = if is_in_memory(&settings.database_url) {
            pinned_pool()
        } else {
            SqlitePoolOptions::new()
        };
        let sqlite_pool = pool_options.connect_with(options).await?;
        Self::with_pool(sqlite_pool, &settings.region).await
    }

    /// Private database that lives as long as the store.
    pub async fn in_memory(region: &str) -> Result<Self, StoreError> {
        let sqlite_pool = pinned_pool().connect("sqlite::memory:").await?;
        Self::with_pool(sqlite_pool, region).await
    }

    async fn with_pool(sqlite_pool: SqlitePool, region: &str) -> Result<Self, StoreError> {
        sqlx::query(CREATE_ITEMS).execute(&sqlite_pool).await?;
        tracing::info!(region, "sqlite store ready");
        Ok(Self {
            sqlite_pool,
            region: region.to_string(),
        })
    }

    pub fn region(&self) -> &str {
        &self.region
    }
}

// every new connection to an in-memory database sees a fresh, empty one
fn pinned_pool() -> SqlitePoolOptions {
    SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
}

fn is_in_memory(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

#[async_trait::async_trait]
impl Store for SqliteStore {
    async fn get(
        &self,
        table: &str,
        key: &Key,
        projection: Option<&[&str]>,
        consistent: bool,
    ) -> Result<Option<Item>, StoreError> {
        // sqlite reads always observe the latest committed write
        tracing::trace!(table, ?key, consistent, "get item");

        let row: Option<(String,)> =
            sqlx::query_as("SELECT attributes FROM items WHERE table_name = ? AND item_key = ?")
                .bind(table)
                .bind(key.encode()?)
                .fetch_optional(&self.sqlite_pool)
                .await?;

        let Some((attributes,)) = row else {
            return Ok(None);
        };

        let mut item: Item = serde_json::from_str(&attributes)?;
        if let Some(names) = projection {
            item.retain(|name, _| names.contains(&name.as_str()));
        }
        Ok(Some(item))
    }

    async fn upsert(
        &self,
        table: &str,
        key: &Key,
        assignments: &[Assignment],
    ) -> Result<(), StoreError> {
        tracing::trace!(table, ?key, count = assignments.len(), "upsert item");

        let mut patch: Map<String, Value> = key
            .attributes()
            .map(|(name, value)| (name.to_string(), Value::String(value.to_string())))
            .collect();
        for assignment in assignments {
            match assignment {
                Assignment::Set(name, value) => {
                    patch.insert(name.clone(), Value::String(value.clone()));
                }
                Assignment::Remove(name) => {
                    patch.insert(name.clone(), Value::Null);
                }
            }
        }

        sqlx::query(UPSERT_ITEM)
            .bind(table)
            .bind(key.encode()?)
            .bind(serde_json::to_string(&patch)?)
            .execute(&self.sqlite_pool)
            .await?;
        Ok(())
    }
}
