//! Bounded-size retention for the history trail

use tracing::{debug, warn};

use crate::models::history::HistoryRecord;
use crate::storage::KeyValueStore;

/// Cut `records` (newest first) down to `max_items`, returning the evicted tail
pub fn truncate(records: &mut Vec<HistoryRecord>, max_items: usize) -> Vec<HistoryRecord> {
    if records.len() <= max_items {
        return Vec::new();
    }
    records.split_off(max_items)
}

/// Delete the artifacts owned by evicted records.
///
/// Failures are logged and skipped. Returns the number of artifacts removed.
pub async fn remove_artifacts(store: &dyn KeyValueStore, evicted: &[HistoryRecord]) -> usize {
    let mut removed = 0;
    for artifact_key in evicted.iter().filter_map(|record| record.artifact_key.as_deref()) {
        match store.remove(artifact_key).await {
            Ok(()) => {
                debug!("Removed evicted artifact {}", artifact_key);
                removed += 1;
            }
            Err(e) => {
                warn!("Failed to remove evicted artifact {}: {}", artifact_key, e);
            }
        }
    }
    removed
}
