//! Deployment history trail
//!
//! Records live in one ordered index (newest first) under [`INDEX_KEY`]; package zips live
//! under per-record keys built by [`artifact_key`]. Storage failures never escape this module:
//! history is a convenience trail and must not change how a run is reported.

pub mod retention;

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::errors::DeployError;
use crate::models::history::HistoryRecord;
use crate::storage::KeyValueStore;
use crate::utils::sha256_hash;

/// Maximum number of records kept
pub const MAX_HISTORY_ITEMS: usize = 500;

/// Key of the record index
pub const INDEX_KEY: &str = "history:index";

/// Where an unreadable index is moved before a new one is started
pub const CORRUPT_INDEX_KEY: &str = "history:index.corrupt";

/// Key under which a record's package zip is stored
pub fn artifact_key(record_key: &str) -> String {
    format!("history:file:{}", record_key)
}

/// Size-bounded history store
pub struct HistoryStore {
    store: Arc<dyn KeyValueStore>,
    max_items: usize,
    write_lock: Mutex<()>,
    last_refreshed: RwLock<Option<DateTime<Utc>>>,
}

impl HistoryStore {
    /// Create a history store keeping [`MAX_HISTORY_ITEMS`] records
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_capacity(store, MAX_HISTORY_ITEMS)
    }

    /// Create a history store keeping at most `max_items` records
    pub fn with_capacity(store: Arc<dyn KeyValueStore>, max_items: usize) -> Self {
        Self {
            store,
            max_items: max_items.max(1),
            write_lock: Mutex::new(()),
            last_refreshed: RwLock::new(None),
        }
    }

    /// When the history was last read successfully
    pub fn last_refreshed(&self) -> Option<DateTime<Utc>> {
        *self.last_refreshed.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Append a record, storing `artifact` alongside it when the backend allows.
    ///
    /// The artifact is written before the index so a crash can leave at worst a record whose
    /// artifact is missing, never an artifact no record points to. A record with an existing
    /// key replaces the old one, and the old artifact goes with it.
    pub async fn append(&self, mut record: HistoryRecord, artifact: Option<&[u8]>) {
        let _guard = self.write_lock.lock().await;

        record.artifact_key = None;
        record.artifact_sha256 = None;
        if let Some(bytes) = artifact {
            self.store_artifact(&mut record, bytes).await;
        }

        let records = match self.store.get(INDEX_KEY).await {
            Ok(None) => Vec::new(),
            Ok(Some(bytes)) => match parse_index(&bytes) {
                Ok(records) => records,
                Err(e) => {
                    error!("{}; moving it to {} and starting a new index", e, CORRUPT_INDEX_KEY);
                    self.set_aside_index(&bytes).await;
                    Vec::new()
                }
            },
            Err(e) => {
                error!("Unable to read history index, dropping record {}: {}", record.key, e);
                if let Some(key) = &record.artifact_key {
                    self.discard_artifact(key).await;
                }
                return;
            }
        };

        let key = record.key.clone();
        let new_artifact = record.artifact_key.clone();
        let (replaced, mut records): (Vec<_>, Vec<_>) =
            records.into_iter().partition(|existing| existing.key == key);
        records.insert(0, record);
        let evicted = retention::truncate(&mut records, self.max_items);

        if let Err(e) = self.write_index(&records).await {
            error!("Unable to write history index, dropping record {}: {}", key, e);
            let owned_before = replaced.iter().any(|old| old.artifact_key == new_artifact);
            if let (Some(artifact), false) = (&new_artifact, owned_before) {
                self.discard_artifact(artifact).await;
            }
            return;
        }
        info!("Recorded deployment {} ({} records kept)", key, records.len());

        // Replaced records share the key, so only an artifact the new record does not own is stale
        let stale: Vec<HistoryRecord> = replaced
            .into_iter()
            .filter(|old| old.artifact_key.is_some() && old.artifact_key != new_artifact)
            .chain(evicted)
            .collect();
        if !stale.is_empty() {
            let removed = retention::remove_artifacts(self.store.as_ref(), &stale).await;
            debug!("Dropped {} records, removed {} artifacts", stale.len(), removed);
        }
    }

    async fn store_artifact(&self, record: &mut HistoryRecord, bytes: &[u8]) {
        if !self.store.supports_large_objects() {
            debug!("Store has no large-object support, not keeping package for {}", record.key);
            return;
        }

        let key = artifact_key(&record.key);
        match self.store.set(&key, bytes).await {
            Ok(()) => {
                record.artifact_sha256 = Some(sha256_hash(bytes));
                record.artifact_key = Some(key);
            }
            Err(e) => {
                warn!("Unable to store package for {}: {}", record.key, e);
            }
        }
    }

    async fn discard_artifact(&self, key: &str) {
        if let Err(e) = self.store.remove(key).await {
            warn!("Unable to remove unreferenced artifact {}: {}", key, e);
        }
    }

    /// Keep an unreadable index under [`CORRUPT_INDEX_KEY`] for manual recovery
    async fn set_aside_index(&self, bytes: &[u8]) {
        if let Err(e) = self.store.set(CORRUPT_INDEX_KEY, bytes).await {
            warn!("Unable to keep a copy of the corrupt history index: {}", e);
        }
    }

    /// List records, newest first
    pub async fn list(&self) -> Vec<HistoryRecord> {
        match self.read_index().await {
            Ok(records) => {
                let mut last_refreshed = self.last_refreshed.write().unwrap_or_else(|e| e.into_inner());
                *last_refreshed = Some(Utc::now());
                records
            }
            Err(e) => {
                error!("Unable to read history index: {}", e);
                Vec::new()
            }
        }
    }

    /// List records deployed to one org, newest first
    pub async fn list_for_org(&self, org_id: &str) -> Vec<HistoryRecord> {
        self.list()
            .await
            .into_iter()
            .filter(|record| record.destination_org.id == org_id)
            .collect()
    }

    /// Get a record by key
    pub async fn get(&self, key: &str) -> Option<HistoryRecord> {
        self.list().await.into_iter().find(|record| record.key == key)
    }

    /// Get the package zip kept for a record.
    ///
    /// Returns `None` when the record kept no package or the package is unavailable.
    pub async fn get_artifact(&self, record_key: &str) -> Option<Vec<u8>> {
        let record = self.get(record_key).await?;
        let artifact_key = record.artifact_key?;

        let bytes = match self.store.get(&artifact_key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                warn!("Artifact {} is unavailable", artifact_key);
                return None;
            }
            Err(e) => {
                error!("Unable to read artifact {}: {}", artifact_key, e);
                return None;
            }
        };

        match record.artifact_sha256 {
            Some(expected) if expected != sha256_hash(&bytes) => {
                warn!("Artifact {} does not match its recorded digest", artifact_key);
                None
            }
            _ => Some(bytes),
        }
    }

    /// Remove every record and artifact
    pub async fn clear(&self) {
        let _guard = self.write_lock.lock().await;

        let records = match self.read_index().await {
            Ok(records) => records,
            Err(e) => {
                error!("Unable to read history index: {}", e);
                Vec::new()
            }
        };
        if let Err(e) = self.store.remove(INDEX_KEY).await {
            error!("Unable to clear history index: {}", e);
            return;
        }
        if let Err(e) = self.store.remove(CORRUPT_INDEX_KEY).await {
            warn!("Unable to remove {}: {}", CORRUPT_INDEX_KEY, e);
        }
        let removed = retention::remove_artifacts(self.store.as_ref(), &records).await;
        info!("Cleared {} history records and {} artifacts", records.len(), removed);
    }

    async fn read_index(&self) -> Result<Vec<HistoryRecord>, DeployError> {
        match self.store.get(INDEX_KEY).await? {
            Some(bytes) => parse_index(&bytes),
            None => Ok(Vec::new()),
        }
    }

    async fn write_index(&self, records: &[HistoryRecord]) -> Result<(), DeployError> {
        let bytes = serde_json::to_vec(records)?;
        self.store.set(INDEX_KEY, &bytes).await
    }
}

fn parse_index(bytes: &[u8]) -> Result<Vec<HistoryRecord>, DeployError> {
    serde_json::from_slice(bytes)
        .map_err(|e| DeployError::StorageError(format!("Corrupt history index: {}", e)))
}
