use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::memory::{Namespace, PreferenceStore};

/// SQLite-backed preference store over the `preferences` table.
#[derive(Debug, Clone)]
pub struct SqlitePreferenceStore {
    pool: SqlitePool,
}

impl SqlitePreferenceStore {
    /// Wrap a pool whose schema has already been migrated.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl PreferenceStore for SqlitePreferenceStore {
    async fn get(&self, namespace: &Namespace, key: &str) -> Result<Option<String>> {
        let value = sqlx::query_scalar::<_, String>(
            "SELECT value FROM preferences WHERE agent_id = ? AND category = ? AND key = ?",
        )
        .bind(namespace.agent_id())
        .bind(namespace.category_key())
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("failed to read preference {} for {}", key, namespace))?;

        Ok(value)
    }

    async fn put(&self, namespace: &Namespace, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO preferences (agent_id, category, key, value, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (agent_id, category, key)
            DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(namespace.agent_id())
        .bind(namespace.category_key())
        .bind(key)
        .bind(value)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to write preference {} for {}", key, namespace))?;

        debug!(%namespace, key, len = value.len(), "stored preference");
        Ok(())
    }
}
