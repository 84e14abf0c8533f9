//! In-memory document store
//!
//! Holds documents for the lifetime of the process. Used by tests and dry runs
//! where nothing should touch disk or the network.

use super::ResultStore;
use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Thread-safe map of document name to JSON value
#[derive(Clone, Default)]
pub struct MemoryStore {
    documents: Arc<RwLock<HashMap<String, Value>>>,
    writes: Arc<RwLock<Vec<String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of documents written so far, in write order
    pub async fn write_log(&self) -> Vec<String> {
        self.writes.read().await.clone()
    }

    /// Names of all stored documents, sorted
    pub async fn names(&self) -> Vec<String> {
        let documents = self.documents.read().await;
        let mut names: Vec<String> = documents.keys().cloned().collect();
        names.sort();
        names
    }
}

#[async_trait]
impl ResultStore for MemoryStore {
    async fn load(&self, name: &str) -> Result<Option<Value>> {
        let documents = self.documents.read().await;
        Ok(documents.get(name).cloned())
    }

    async fn save(&self, name: &str, data: &Value) -> Result<()> {
        self.documents
            .write()
            .await
            .insert(name.to_string(), data.clone());
        self.writes.write().await.push(name.to_string());
        debug!("[MemoryStore] Saved {}", name);
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
