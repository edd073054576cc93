//! Remote metadata job API contract

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::deploy::manifest::PackageManifest;
use crate::errors::DeployError;
use crate::models::deployment::{DeployOptions, OrgRef};
use crate::models::result::{DeployResult, RetrieveStatus};

/// Platform-assigned id of an asynchronous job
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        JobId(id.to_string())
    }
}

/// Asynchronous retrieve/deploy jobs on a remote org.
///
/// `check_*` calls have no side effects and a `done` snapshot never changes afterwards.
/// Failures are reported as [`DeployError::TransportError`] carrying the platform's text.
#[async_trait]
pub trait RemoteJobClient: Send + Sync {
    /// Start a retrieve of the components listed in `manifest`
    async fn retrieve(&self, org: &OrgRef, manifest: &PackageManifest) -> Result<JobId, DeployError>;

    /// Check a retrieve job
    async fn check_retrieve(&self, org: &OrgRef, job_id: &JobId) -> Result<RetrieveStatus, DeployError>;

    /// Start a deploy of a package zip
    async fn deploy(
        &self,
        org: &OrgRef,
        zip_bytes: &[u8],
        options: &DeployOptions,
    ) -> Result<JobId, DeployError>;

    /// Check a deploy job
    async fn check_deploy(&self, org: &OrgRef, job_id: &JobId) -> Result<DeployResult, DeployError>;
}
