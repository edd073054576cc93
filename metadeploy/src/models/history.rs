//! Deployment history models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::deployment::{DeployOptions, DeploymentMode, MetadataSummary, OrgRef};
use crate::models::result::{DeployResult, DeployStatus};

/// A completed run, as kept in the history trail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    /// Destination org, mode and start time; unique and chronological per org
    pub key: String,

    pub mode: DeploymentMode,

    #[serde(default)]
    pub source_org: Option<OrgRef>,

    pub destination_org: OrgRef,

    pub start: DateTime<Utc>,

    pub finish: DateTime<Utc>,

    pub status: DeployStatus,

    pub deploy_options: DeployOptions,

    pub metadata_summary: MetadataSummary,

    #[serde(default)]
    pub result: Option<DeployResult>,

    /// Error text for runs that failed before a result was available
    #[serde(default)]
    pub error_message: Option<String>,

    #[serde(default)]
    pub changeset_name: Option<String>,

    /// Key of the stored package zip, if one was kept
    #[serde(default)]
    pub artifact_key: Option<String>,

    /// SHA-256 of the stored package zip
    #[serde(default)]
    pub artifact_sha256: Option<String>,
}

impl HistoryRecord {
    /// Build the record key for a run
    pub fn make_key(destination_org_id: &str, mode: DeploymentMode, start: DateTime<Utc>) -> String {
        format!(
            "{}:{}:{}",
            destination_org_id,
            mode.as_str(),
            start.timestamp_millis()
        )
    }
}
