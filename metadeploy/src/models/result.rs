//! Remote job status models

use serde::{Deserialize, Serialize};

/// Status reported by the remote deploy job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeployStatus {
    Pending,
    InProgress,
    Canceling,
    Succeeded,
    SucceededPartial,
    Failed,
    Canceled,
}

impl DeployStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, DeployStatus::Succeeded | DeployStatus::SucceededPartial)
    }
}

/// A component the platform deployed or rejected
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentMessage {
    pub component_type: String,
    pub full_name: String,
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub problem: Option<String>,
    #[serde(default)]
    pub line_number: Option<u32>,
}

/// A failed unit test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestFailure {
    pub name: String,
    pub method_name: String,
    pub message: String,
    #[serde(default)]
    pub stack_trace: Option<String>,
}

/// Code coverage warning raised by the deploy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageWarning {
    #[serde(default)]
    pub name: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeployDetails {
    pub component_successes: Vec<ComponentMessage>,
    pub component_failures: Vec<ComponentMessage>,
    pub test_failures: Vec<TestFailure>,
    pub coverage_warnings: Vec<CoverageWarning>,
}

/// Snapshot of a deploy job as reported by the platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployResult {
    pub id: String,
    pub done: bool,
    pub status: DeployStatus,
    #[serde(default)]
    pub check_only: bool,
    #[serde(default)]
    pub components_total: u32,
    #[serde(default)]
    pub components_deployed: u32,
    #[serde(default)]
    pub components_errors: u32,
    #[serde(default)]
    pub tests_total: u32,
    #[serde(default)]
    pub tests_completed: u32,
    #[serde(default)]
    pub tests_errors: u32,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub details: DeployDetails,
}

impl DeployResult {
    /// One-line outcome built from the platform counts
    pub fn summary(&self) -> String {
        let action = if self.check_only { "Validation" } else { "Deployment" };
        let outcome = match self.status {
            DeployStatus::Succeeded => "succeeded",
            DeployStatus::SucceededPartial => "partially succeeded",
            DeployStatus::Failed => "failed",
            DeployStatus::Canceled => "was canceled",
            DeployStatus::Pending | DeployStatus::InProgress | DeployStatus::Canceling => {
                "is in progress"
            }
        };

        let mut summary = format!(
            "{action} {outcome}: {} of {} components deployed",
            self.components_deployed, self.components_total
        );
        if self.components_errors > 0 {
            summary.push_str(&format!(", {} with errors", self.components_errors));
        }
        if self.tests_total > 0 {
            summary.push_str(&format!(
                ". Tests: {} of {} run, {} failed",
                self.tests_completed, self.tests_total, self.tests_errors
            ));
        }
        summary
    }
}

/// Snapshot of a retrieve job
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrieveStatus {
    pub id: String,
    pub done: bool,

    /// Package zip, present once the job is done
    #[serde(skip)]
    pub zip_bytes: Option<Vec<u8>>,

    /// Files included in the package
    #[serde(default)]
    pub file_manifest: Vec<String>,

    /// Platform error text for a failed retrieve
    #[serde(default)]
    pub error: Option<String>,
}
