//! Keyed persistent store abstraction

use async_trait::async_trait;

use crate::errors::DeployError;

/// Key/value byte store backing the deployment history.
///
/// Implementations must tolerate concurrent readers; writers are serialized by the caller.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Get the value stored under `key`
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, DeployError>;

    /// Store `value` under `key`, replacing any previous value
    async fn set(&self, key: &str, value: &[u8]) -> Result<(), DeployError>;

    /// Remove `key`. Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<(), DeployError>;

    /// Whether the backend accepts large binary values (package zips)
    fn supports_large_objects(&self) -> bool;
}
