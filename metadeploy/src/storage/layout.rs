//! Storage layout configuration

use std::path::PathBuf;

use crate::errors::DeployError;
use crate::filesys::dir::Dir;
use crate::filesys::file::File;

/// On-disk layout for metadeploy state
#[derive(Debug, Clone)]
pub struct StorageLayout {
    /// Base directory for all storage
    pub base_dir: PathBuf,
}

impl StorageLayout {
    /// Create a new storage layout
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base(&self) -> Dir {
        Dir::new(&self.base_dir)
    }

    /// Get the settings file path
    pub fn settings_file(&self) -> File {
        self.base().file("settings.json")
    }

    /// Get the key/value store directory (history index and package artifacts)
    pub fn store_dir(&self) -> Dir {
        self.base().subdir("store")
    }

    /// Get the logs directory
    pub fn logs_dir(&self) -> Dir {
        self.base().subdir("logs")
    }

    /// Setup the storage layout (create directories)
    pub async fn setup(&self) -> Result<(), DeployError> {
        self.store_dir().create().await?;
        self.logs_dir().create().await?;
        Ok(())
    }
}

impl Default for StorageLayout {
    fn default() -> Self {
        let base_dir = std::env::var_os("METADEPLOY_HOME")
            .map(PathBuf::from)
            .or_else(|| home_dir().map(|home| home.join(".metadeploy")))
            .unwrap_or_else(|| PathBuf::from(".metadeploy"));

        Self::new(base_dir)
    }
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}
