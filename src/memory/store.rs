//! Memory store backends
//!
//! Items are appended under a user partition with a monotonically
//! increasing sort key (`ix#<millis>`) and an expiry the store enforces
//! on read. The Postgres backend tolerates a pre-existing table without
//! the sort-key column by degrading to a full-partition read plus an
//! in-memory sort.

use crate::error::AgentError;
use crate::models::{MemoryItem, MemoryRole};
use crate::Result;
use chrono::Utc;
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use std::collections::HashMap;
use std::env;
use std::sync::Arc;
use tokio::sync::{OnceCell, RwLock};
use tracing::{info, warn};

const SORT_KEY_PREFIX: &str = "ix#";

/// Trait for conversational memory persistence
#[async_trait::async_trait]
pub trait MemoryStore: Send + Sync {
    /// Append one item under the user's partition.
    async fn append(
        &self,
        user_id: &str,
        role: MemoryRole,
        text: &str,
        ttl_seconds: i64,
    ) -> Result<()>;

    /// Most recent `limit` unexpired items for the user, newest first.
    async fn recent(&self, user_id: &str, limit: usize) -> Result<Vec<MemoryItem>>;
}

fn new_item(user_id: &str, role: MemoryRole, text: &str, ttl_seconds: i64) -> MemoryItem {
    let now = Utc::now().timestamp_millis();
    MemoryItem {
        user_id: user_id.to_string(),
        sort_key: format!("{}{}", SORT_KEY_PREFIX, now),
        role,
        text: text.to_string(),
        created_at: now,
        ttl: now / 1000 + ttl_seconds,
    }
}

//
// ================= In-Memory Backend =================
//

/// In-memory memory store for development and tests
pub struct InMemoryMemoryStore {
    partitions: Arc<RwLock<HashMap<String, Vec<MemoryItem>>>>,
}

impl InMemoryMemoryStore {
    pub fn new() -> Self {
        Self {
            partitions: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl MemoryStore for InMemoryMemoryStore {
    async fn append(
        &self,
        user_id: &str,
        role: MemoryRole,
        text: &str,
        ttl_seconds: i64,
    ) -> Result<()> {
        let item = new_item(user_id, role, text, ttl_seconds);
        let now_secs = Utc::now().timestamp();

        let mut partitions = self.partitions.write().await;
        let partition = partitions.entry(user_id.to_string()).or_insert_with(Vec::new);
        partition.retain(|it| it.ttl > now_secs);
        partition.push(item);

        Ok(())
    }

    async fn recent(&self, user_id: &str, limit: usize) -> Result<Vec<MemoryItem>> {
        let now_secs = Utc::now().timestamp();
        let partitions = self.partitions.read().await;

        // Appends are chronological, so newest-first is the reverse of
        // insertion order; ties within one millisecond stay correct.
        Ok(partitions
            .get(user_id)
            .map(|p| {
                p.iter()
                    .rev()
                    .filter(|it| it.ttl > now_secs)
                    .take(limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

//
// ================= Postgres Backend =================
//

/// Postgres-backed memory store
pub struct PostgresMemoryStore {
    pool: PgPool,
    schema_ready: OnceCell<()>,
}

impl PostgresMemoryStore {
    /// Build from `POSTGRES_URL` / `DATABASE_URL`; None when unset.
    pub fn from_env() -> Option<Self> {
        let url = env::var("POSTGRES_URL")
            .or_else(|_| env::var("DATABASE_URL"))
            .ok()?;

        match PgPoolOptions::new().max_connections(5).connect_lazy(&url) {
            Ok(pool) => {
                info!("Memory store backend: postgres");
                Some(Self {
                    pool,
                    schema_ready: OnceCell::new(),
                })
            }
            Err(error) => {
                warn!(
                    "Failed to initialize postgres memory store, falling back to in-memory: {}",
                    error
                );
                None
            }
        }
    }

    async fn ensure_schema(&self) -> Result<()> {
        self.schema_ready
            .get_or_try_init(|| async move {
                sqlx::query(
                    r#"
                    CREATE TABLE IF NOT EXISTS user_memory (
                      user_id TEXT NOT NULL,
                      sort_key TEXT NOT NULL,
                      role TEXT NOT NULL,
                      text TEXT NOT NULL,
                      created_at BIGINT NOT NULL,
                      ttl BIGINT NOT NULL,
                      PRIMARY KEY (user_id, sort_key)
                    );
                    "#,
                )
                .execute(&self.pool)
                .await?;

                Ok::<(), sqlx::Error>(())
            })
            .await
            .map_err(|e| {
                AgentError::DatabaseError(format!("Failed to initialize memory schema: {}", e))
            })?;

        Ok(())
    }

    fn role_to_db(role: MemoryRole) -> &'static str {
        match role {
            MemoryRole::User => "user",
            MemoryRole::Assistant => "assistant",
        }
    }

    fn role_from_db(role: &str) -> MemoryRole {
        match role.to_lowercase().as_str() {
            "assistant" => MemoryRole::Assistant,
            _ => MemoryRole::User,
        }
    }

    fn is_schema_mismatch(error: &sqlx::Error) -> bool {
        match error {
            sqlx::Error::Database(db) => {
                // undefined_column
                db.code().as_deref() == Some("42703")
            }
            other => other.to_string().contains("does not exist"),
        }
    }

    fn item_from_row(user_id: &str, row: &sqlx::postgres::PgRow) -> MemoryItem {
        let created_at: i64 = row.try_get("created_at").unwrap_or(0);
        MemoryItem {
            user_id: user_id.to_string(),
            sort_key: row
                .try_get("sort_key")
                .unwrap_or_else(|_| format!("{}{}", SORT_KEY_PREFIX, created_at)),
            role: Self::role_from_db(&row.try_get::<String, _>("role").unwrap_or_default()),
            text: row.try_get("text").unwrap_or_default(),
            created_at,
            ttl: row.try_get("ttl").unwrap_or(0),
        }
    }
}

#[async_trait::async_trait]
impl MemoryStore for PostgresMemoryStore {
    async fn append(
        &self,
        user_id: &str,
        role: MemoryRole,
        text: &str,
        ttl_seconds: i64,
    ) -> Result<()> {
        self.ensure_schema().await?;
        let item = new_item(user_id, role, text, ttl_seconds);

        sqlx::query(
            r#"
            INSERT INTO user_memory (user_id, sort_key, role, text, created_at, ttl)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id, sort_key)
            DO UPDATE SET role = $3, text = $4, created_at = $5, ttl = $6
            "#,
        )
        .bind(&item.user_id)
        .bind(&item.sort_key)
        .bind(Self::role_to_db(item.role))
        .bind(&item.text)
        .bind(item.created_at)
        .bind(item.ttl)
        .execute(&self.pool)
        .await
        .map_err(|e| AgentError::DatabaseError(format!("Failed to append memory item: {}", e)))?;

        Ok(())
    }

    async fn recent(&self, user_id: &str, limit: usize) -> Result<Vec<MemoryItem>> {
        self.ensure_schema().await?;
        let now_secs = Utc::now().timestamp();

        // Attempt 1: the table has the sort-key column
        let ordered = sqlx::query(
            r#"
            SELECT sort_key, role, text, created_at, ttl
            FROM user_memory
            WHERE user_id = $1 AND sort_key LIKE $2 AND ttl > $3
            ORDER BY sort_key DESC
            LIMIT $4
            "#,
        )
        .bind(user_id)
        .bind(format!("{}%", SORT_KEY_PREFIX))
        .bind(now_secs)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await;

        match ordered {
            Ok(rows) => Ok(rows
                .iter()
                .map(|row| Self::item_from_row(user_id, row))
                .collect()),
            Err(error) if Self::is_schema_mismatch(&error) => {
                // Attempt 2: older table without a sort key. Full partition
                // read, then sort and trim in memory.
                warn!(
                    "Memory sort-key schema missing, degrading to full scan: {}",
                    error
                );

                let rows = sqlx::query(
                    "SELECT role, text, created_at, ttl FROM user_memory WHERE user_id = $1",
                )
                .bind(user_id)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| {
                    AgentError::DatabaseError(format!("Degraded memory query failed: {}", e))
                })?;

                let mut items: Vec<MemoryItem> = rows
                    .iter()
                    .map(|row| Self::item_from_row(user_id, row))
                    .filter(|it| it.ttl > now_secs)
                    .collect();
                items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                items.truncate(limit);
                Ok(items)
            }
            Err(error) => Err(AgentError::DatabaseError(format!(
                "Failed to query recent memory: {}",
                error
            ))),
        }
    }
}

/// Pick the memory backend: Postgres when configured, in-memory otherwise.
pub fn build_memory_store() -> Arc<dyn MemoryStore> {
    match PostgresMemoryStore::from_env() {
        Some(store) => Arc::new(store),
        None => {
            info!("Memory store backend: in-memory");
            Arc::new(InMemoryMemoryStore::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_append_and_recent_ordering() {
        let store = InMemoryMemoryStore::new();

        store
            .append("u1", MemoryRole::User, "primera", 3600)
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        store
            .append("u1", MemoryRole::Assistant, "segunda", 3600)
            .await
            .unwrap();

        let items = store.recent("u1", 6).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].text, "segunda");
        assert_eq!(items[1].text, "primera");
        assert!(items[0].sort_key.starts_with(SORT_KEY_PREFIX));
    }

    #[tokio::test]
    async fn test_recent_respects_limit_and_partition() {
        let store = InMemoryMemoryStore::new();

        for i in 0..10 {
            store
                .append("u1", MemoryRole::User, &format!("m{}", i), 3600)
                .await
                .unwrap();
        }
        store
            .append("u2", MemoryRole::User, "otra", 3600)
            .await
            .unwrap();

        let items = store.recent("u1", 6).await.unwrap();
        assert_eq!(items.len(), 6);
        assert!(items.iter().all(|it| it.user_id == "u1"));
    }

    #[tokio::test]
    async fn test_expired_items_are_invisible() {
        let store = InMemoryMemoryStore::new();

        store
            .append("u1", MemoryRole::User, "vieja", -10)
            .await
            .unwrap();
        store
            .append("u1", MemoryRole::User, "vigente", 3600)
            .await
            .unwrap();

        let items = store.recent("u1", 6).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].text, "vigente");
    }
}
