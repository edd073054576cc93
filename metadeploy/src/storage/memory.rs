//! In-memory store

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::errors::DeployError;
use crate::storage::store::KeyValueStore;

/// In-memory key/value store
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
    large_objects: bool,
}

impl MemoryStore {
    /// Create a store that accepts large objects
    pub fn new() -> Self {
        Self::with_large_objects(true)
    }

    /// Create a store with an explicit large-object capability
    pub fn with_large_objects(large_objects: bool) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            large_objects,
        }
    }

    /// Check whether a key is present
    pub fn contains(&self, key: &str) -> bool {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.contains_key(key)
    }

    /// Get all stored keys
    pub fn keys(&self) -> Vec<String> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, DeployError> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), DeployError> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), DeployError> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.remove(key);
        Ok(())
    }

    fn supports_large_objects(&self) -> bool {
        self.large_objects
    }
}
