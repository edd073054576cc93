//! Directory-backed store

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use tracing::debug;

use crate::errors::DeployError;
use crate::filesys::dir::Dir;
use crate::filesys::file::File;
use crate::storage::store::KeyValueStore;

/// Store that keeps one file per key inside a directory.
///
/// Keys are base64url-encoded into file names so any key is a valid path segment.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: Dir,
}

impl FileStore {
    /// Create a file store rooted at `dir`
    pub fn new(dir: Dir) -> Self {
        Self { dir }
    }

    /// Create the backing directory
    pub async fn setup(&self) -> Result<(), DeployError> {
        self.dir.create().await
    }

    pub fn dir(&self) -> &Dir {
        &self.dir
    }

    fn file_for(&self, key: &str) -> File {
        self.dir.file(&format!("{}.bin", URL_SAFE_NO_PAD.encode(key)))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, DeployError> {
        let file = self.file_for(key);
        if !file.exists().await {
            return Ok(None);
        }
        Ok(Some(file.read_bytes().await?))
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), DeployError> {
        debug!("Writing {} bytes under key {}", value.len(), key);
        self.file_for(key).write_atomic(value).await
    }

    async fn remove(&self, key: &str) -> Result<(), DeployError> {
        self.file_for(key).delete().await
    }

    fn supports_large_objects(&self) -> bool {
        true
    }
}
