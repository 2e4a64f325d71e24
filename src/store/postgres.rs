//! PostgreSQL node store for production use.
//!
//! ## Configuration
//!
//! All settings can be configured via environment variables:
//! - `DATABASE_URL`: PostgreSQL connection string (required)
//! - `DB_MAX_CONNECTIONS`: Maximum pool size (default: 10)
//! - `DB_MIN_CONNECTIONS`: Minimum idle connections (default: 2)
//! - `DB_CONNECT_TIMEOUT_SECS`: Connection timeout (default: 10)
//! - `DB_IDLE_TIMEOUT_SECS`: Idle connection timeout (default: 300)
//! - `DB_MAX_LIFETIME_SECS`: Max connection lifetime (default: 1800)

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use std::time::Duration;
use uuid::Uuid;

use super::{NodeStore, StoreError};
use crate::types::{AssetRef, EditGroupId, NodeId, SpriteNode};

/// Logical schema for the node table.
///
/// A single append-only table keyed by id, with secondary indexes on
/// `parent_id` (children lookup) and `edit_group_id` (commit arbitration).
/// The partial unique index is the store-level serializer for the
/// canonical slot: at most one canonical row per edit group, enforced by
/// the database even under concurrent commits.
pub const SPRITE_NODES_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS sprite_nodes (
    id               UUID PRIMARY KEY,
    parent_id        UUID REFERENCES sprite_nodes(id),
    asset_ref        TEXT NOT NULL,
    description      TEXT NOT NULL,
    edit_description TEXT,
    edit_group_id    UUID,
    canonical        BOOLEAN NOT NULL DEFAULT FALSE,
    created_at       TIMESTAMPTZ NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_sprite_nodes_parent ON sprite_nodes (parent_id);
CREATE INDEX IF NOT EXISTS idx_sprite_nodes_group ON sprite_nodes (edit_group_id);
CREATE UNIQUE INDEX IF NOT EXISTS uniq_sprite_nodes_canonical_per_group
    ON sprite_nodes (edit_group_id) WHERE canonical AND edit_group_id IS NOT NULL;
"#;

/// Configuration for the PostgreSQL connection pool.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Database connection URL.
    pub database_url: String,
    /// Maximum connections in pool (default: 10).
    pub max_connections: u32,
    /// Minimum idle connections to keep warm (default: 2).
    pub min_connections: u32,
    /// Connection acquire timeout in seconds (default: 10).
    pub connect_timeout_secs: u64,
    /// Idle connection timeout in seconds (default: 300 = 5 min).
    pub idle_timeout_secs: u64,
    /// Maximum connection lifetime in seconds (default: 1800 = 30 min).
    pub max_lifetime_secs: u64,
}

impl PostgresConfig {
    /// Load configuration from environment variables with production defaults.
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgresql://localhost/sprites".to_string()),
            max_connections: env_parse("DB_MAX_CONNECTIONS", 10),
            min_connections: env_parse("DB_MIN_CONNECTIONS", 2),
            connect_timeout_secs: env_parse("DB_CONNECT_TIMEOUT_SECS", 10),
            idle_timeout_secs: env_parse("DB_IDLE_TIMEOUT_SECS", 300),
            max_lifetime_secs: env_parse("DB_MAX_LIFETIME_SECS", 1800),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// PostgreSQL node store.
///
/// Uses connection pooling with production-tuned settings.
pub struct PostgresNodeStore {
    pool: PgPool,
}

/// Pool statistics for monitoring.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PoolStats {
    /// Current pool size.
    pub size: u32,
    /// Number of idle connections.
    pub idle: usize,
    /// Maximum pool size.
    pub max: u32,
}

impl PostgresNodeStore {
    /// Create a new store with the given configuration.
    pub async fn new(config: PostgresConfig) -> Result<Self, sqlx::Error> {
        tracing::info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            connect_timeout_secs = config.connect_timeout_secs,
            "Initializing PostgreSQL connection pool"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
            .test_before_acquire(true)
            .connect(&config.database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Create a store from environment variables.
    pub async fn from_env() -> Result<Self, sqlx::Error> {
        Self::new(PostgresConfig::from_env()).await
    }

    /// Apply the node table schema (idempotent).
    pub async fn migrate(&self) -> Result<(), sqlx::Error> {
        sqlx::raw_sql(SPRITE_NODES_SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    /// Get the connection pool for health checks.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check if the database is reachable.
    pub async fn is_healthy(&self) -> bool {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await.is_ok()
    }

    /// Get pool statistics for monitoring.
    pub fn pool_stats(&self) -> PoolStats {
        PoolStats {
            size: self.pool.size(),
            idle: self.pool.num_idle(),
            max: self.pool.options().get_max_connections(),
        }
    }

    fn parse_node_row(row: &sqlx::postgres::PgRow) -> Result<SpriteNode, sqlx::Error> {
        let id: Uuid = row.try_get("id")?;
        let parent_id: Option<Uuid> = row.try_get("parent_id")?;
        let asset_ref: String = row.try_get("asset_ref")?;
        let description: String = row.try_get("description")?;
        let edit_description: Option<String> = row.try_get("edit_description")?;
        let edit_group_id: Option<Uuid> = row.try_get("edit_group_id")?;
        let canonical: bool = row.try_get("canonical")?;
        let created_at: chrono::DateTime<chrono::Utc> = row.try_get("created_at")?;

        Ok(SpriteNode {
            id: NodeId::new(id),
            parent_id: parent_id.map(NodeId::new),
            asset: AssetRef::new(asset_ref),
            description,
            edit_description,
            edit_group: edit_group_id.map(EditGroupId::new),
            canonical,
            created_at: created_at.timestamp(),
        })
    }
}

const NODE_COLUMNS: &str =
    "id, parent_id, asset_ref, description, edit_description, edit_group_id, canonical, created_at";

fn db_err(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

#[async_trait]
impl NodeStore for PostgresNodeStore {
    async fn put(&self, node: SpriteNode) -> Result<(), StoreError> {
        node.check_shape()?;

        // Parents are append-only and never deleted, so checking existence
        // before the insert cannot race with a removal.
        if let Some(parent) = node.parent_id {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM sprite_nodes WHERE id = $1)")
                    .bind(parent.as_uuid())
                    .fetch_one(&self.pool)
                    .await
                    .map_err(db_err)?;
            if !exists {
                return Err(StoreError::DanglingParent {
                    child: node.id,
                    parent,
                });
            }
        }

        let created_at = chrono::DateTime::<chrono::Utc>::from_timestamp(node.created_at, 0)
            .ok_or_else(|| StoreError::Backend(format!("invalid timestamp {}", node.created_at)))?;

        let result = sqlx::query(
            r#"
            INSERT INTO sprite_nodes
                (id, parent_id, asset_ref, description, edit_description,
                 edit_group_id, canonical, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(node.id.as_uuid())
        .bind(node.parent_id.map(|p| p.as_uuid()))
        .bind(node.asset.as_str())
        .bind(&node.description)
        .bind(node.edit_description.as_deref())
        .bind(node.edit_group.map(|g| g.as_uuid()))
        .bind(node.canonical)
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::DuplicateId(node.id));
        }

        tracing::debug!(node_id = %node.id, root = node.is_root(), "node stored");
        Ok(())
    }

    async fn get(&self, id: &NodeId) -> Result<Option<SpriteNode>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {NODE_COLUMNS} FROM sprite_nodes WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        match row {
            Some(ref r) => Ok(Some(Self::parse_node_row(r).map_err(db_err)?)),
            None => Ok(None),
        }
    }

    async fn get_many(&self, ids: &[NodeId]) -> Result<Vec<SpriteNode>, StoreError> {
        let uuids: Vec<Uuid> = ids.iter().map(|id| id.as_uuid()).collect();
        let rows = sqlx::query(&format!(
            "SELECT {NODE_COLUMNS} FROM sprite_nodes WHERE id = ANY($1) ORDER BY created_at, id"
        ))
        .bind(&uuids)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter()
            .map(|r| Self::parse_node_row(r).map_err(db_err))
            .collect()
    }

    async fn children_of(&self, id: &NodeId) -> Result<Vec<SpriteNode>, StoreError> {
        if self.get(id).await?.is_none() {
            return Err(StoreError::NotFound(*id));
        }

        let rows = sqlx::query(&format!(
            "SELECT {NODE_COLUMNS} FROM sprite_nodes WHERE parent_id = $1 ORDER BY created_at, id"
        ))
        .bind(id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter()
            .map(|r| Self::parse_node_row(r).map_err(db_err))
            .collect()
    }

    async fn group_members(&self, group: &EditGroupId) -> Result<Vec<SpriteNode>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {NODE_COLUMNS} FROM sprite_nodes WHERE edit_group_id = $1 ORDER BY created_at, id"
        ))
        .bind(group.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        if rows.is_empty() {
            return Err(StoreError::GroupNotFound(*group));
        }

        rows.iter()
            .map(|r| Self::parse_node_row(r).map_err(db_err))
            .collect()
    }

    async fn list_all(&self) -> Result<Vec<SpriteNode>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {NODE_COLUMNS} FROM sprite_nodes ORDER BY created_at, id"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter()
            .map(|r| Self::parse_node_row(r).map_err(db_err))
            .collect()
    }

    async fn commit_canonical(
        &self,
        group: &EditGroupId,
        chosen: &NodeId,
    ) -> Result<SpriteNode, StoreError> {
        // The conditional UPDATE is the fast path; the partial unique index
        // on (edit_group_id) WHERE canonical is the serializer that makes
        // the slot a true compare-and-set under concurrent commits.
        let result = sqlx::query(&format!(
            r#"
            UPDATE sprite_nodes
            SET canonical = TRUE
            WHERE id = $1
              AND edit_group_id = $2
              AND NOT EXISTS (
                  SELECT 1 FROM sprite_nodes
                  WHERE edit_group_id = $2 AND canonical AND id <> $1
              )
            RETURNING {NODE_COLUMNS}
            "#
        ))
        .bind(chosen.as_uuid())
        .bind(group.as_uuid())
        .fetch_optional(&self.pool)
        .await;

        match result {
            Ok(Some(ref row)) => {
                let node = Self::parse_node_row(row).map_err(db_err)?;
                tracing::info!(group = %group, chosen = %chosen, "edit group committed");
                Ok(node)
            }
            Ok(None) => {
                // Diagnose which precondition failed.
                let members = self.group_members(group).await?;
                if !members.iter().any(|m| m.id == *chosen) {
                    return Err(StoreError::NotInGroup {
                        group: *group,
                        node: *chosen,
                    });
                }
                match members.iter().find(|m| m.canonical) {
                    Some(committed) if committed.id != *chosen => {
                        Err(StoreError::AlreadyCommitted {
                            group: *group,
                            committed: committed.id,
                            attempted: *chosen,
                        })
                    }
                    _ => Err(StoreError::Backend(format!(
                        "commit of {chosen} in group {group} failed without a visible cause"
                    ))),
                }
            }
            Err(e) => {
                // Unique-index violation: a racing commit took the slot first.
                if let sqlx::Error::Database(ref dbe) = e {
                    if dbe.code().as_deref() == Some("23505") {
                        let members = self.group_members(group).await?;
                        if let Some(committed) = members.iter().find(|m| m.canonical) {
                            return Err(StoreError::AlreadyCommitted {
                                group: *group,
                                committed: committed.id,
                                attempted: *chosen,
                            });
                        }
                    }
                }
                Err(db_err(e))
            }
        }
    }
}
