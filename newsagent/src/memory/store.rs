use anyhow::Result;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::Namespace;

/// Namespaced key-value persistence for preference profiles.
///
/// `put` overwrites; there is no locking across a read-then-write, so concurrent
/// writers to the same slot resolve as last-writer-wins.
#[async_trait::async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn get(&self, namespace: &Namespace, key: &str) -> Result<Option<String>>;

    async fn put(&self, namespace: &Namespace, key: &str, value: &str) -> Result<()>;
}

/// Process-local store, used for ephemeral runs and tests
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: RwLock<HashMap<(Namespace, String), String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl PreferenceStore for InMemoryStore {
    async fn get(&self, namespace: &Namespace, key: &str) -> Result<Option<String>> {
        let entries = self.entries.read().await;
        Ok(entries.get(&(namespace.clone(), key.to_string())).cloned())
    }

    async fn put(&self, namespace: &Namespace, key: &str, value: &str) -> Result<()> {
        self.entries
            .write()
            .await
            .insert((namespace.clone(), key.to_string()), value.to_string());
        Ok(())
    }
}
