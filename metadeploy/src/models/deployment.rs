//! Deployment request models

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// How a run obtains its package and where it sends it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeploymentMode {
    /// Deploy a pre-built zip; no retrieve step
    PackageUpload,

    /// Retrieve from one org and deploy into another
    OrgToOrg,

    /// Retrieve from an org and deploy back into an outbound changeset on the same org
    AddToChangeset,
}

impl DeploymentMode {
    /// Whether the run begins with a retrieve job
    pub fn requires_retrieve(&self) -> bool {
        !matches!(self, DeploymentMode::PackageUpload)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentMode::PackageUpload => "package-upload",
            DeploymentMode::OrgToOrg => "org-to-org",
            DeploymentMode::AddToChangeset => "add-to-changeset",
        }
    }
}

impl fmt::Display for DeploymentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Org environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OrgType {
    Production,
    #[default]
    Sandbox,
    Developer,
    Scratch,
}

/// A connected org, as known to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgRef {
    /// Unique org ID
    pub id: String,

    /// Display label (usually the username)
    #[serde(default)]
    pub label: String,

    #[serde(default)]
    pub org_type: OrgType,
}

impl OrgRef {
    pub fn new(id: impl Into<String>, org_type: OrgType) -> Self {
        let id = id.into();
        Self {
            label: id.clone(),
            id,
            org_type,
        }
    }
}

/// A metadata component selected for deployment
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentRef {
    pub full_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

impl ComponentRef {
    pub fn new(full_name: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            file_name: None,
        }
    }
}

/// Selected components keyed by metadata type name
pub type MetadataSelection = BTreeMap<String, Vec<ComponentRef>>;

/// Test execution level for a deploy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TestLevel {
    #[default]
    Default,
    NoTestRun,
    RunSpecifiedTests,
    RunLocalTests,
    RunAllTestsInOrg,
}

/// Options passed to the remote deploy endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeployOptions {
    pub check_only: bool,
    pub rollback_on_error: bool,
    pub ignore_warnings: bool,
    pub purge_on_delete: bool,
    pub allow_missing_files: bool,
    pub auto_update_package: bool,
    pub single_package: bool,
    pub test_level: TestLevel,
    pub run_tests: Vec<String>,
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self {
            check_only: false,
            rollback_on_error: true,
            ignore_warnings: false,
            purge_on_delete: false,
            allow_missing_files: false,
            auto_update_package: false,
            single_package: true,
            test_level: TestLevel::Default,
            run_tests: Vec::new(),
        }
    }
}

impl DeployOptions {
    /// Options as sent when adding components to a changeset.
    ///
    /// Changeset updates never run tests and must not be a single package.
    pub fn for_changeset(&self) -> Self {
        Self {
            auto_update_package: true,
            single_package: false,
            test_level: TestLevel::NoTestRun,
            run_tests: Vec::new(),
            ..self.clone()
        }
    }
}

/// Immutable input for one orchestration run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRequest {
    pub mode: DeploymentMode,

    /// Org the package is retrieved from. Absent for package uploads.
    #[serde(default)]
    pub source_org: Option<OrgRef>,

    pub destination_org: OrgRef,

    #[serde(default)]
    pub selected_metadata: MetadataSelection,

    #[serde(default)]
    pub deploy_options: DeployOptions,

    #[serde(default)]
    pub changeset_name: Option<String>,

    #[serde(default)]
    pub changeset_description: Option<String>,

    /// Pre-built package zip for package uploads
    #[serde(skip)]
    pub package: Option<Vec<u8>>,
}

impl DeploymentRequest {
    /// Upload a pre-built package to `destination_org`
    pub fn package_upload(destination_org: OrgRef, package: Vec<u8>, options: DeployOptions) -> Self {
        Self {
            mode: DeploymentMode::PackageUpload,
            source_org: None,
            destination_org,
            selected_metadata: MetadataSelection::new(),
            deploy_options: options,
            changeset_name: None,
            changeset_description: None,
            package: Some(package),
        }
    }

    /// Move `selection` from `source_org` into `destination_org`
    pub fn org_to_org(
        source_org: OrgRef,
        destination_org: OrgRef,
        selection: MetadataSelection,
        options: DeployOptions,
    ) -> Self {
        Self {
            mode: DeploymentMode::OrgToOrg,
            source_org: Some(source_org),
            destination_org,
            selected_metadata: selection,
            deploy_options: options,
            changeset_name: None,
            changeset_description: None,
            package: None,
        }
    }

    /// Add `selection` to the outbound changeset `name` on `org`
    pub fn add_to_changeset(
        org: OrgRef,
        selection: MetadataSelection,
        name: impl Into<String>,
        description: Option<String>,
        options: DeployOptions,
    ) -> Self {
        Self {
            mode: DeploymentMode::AddToChangeset,
            source_org: Some(org.clone()),
            destination_org: org,
            selected_metadata: selection,
            deploy_options: options,
            changeset_name: Some(name.into()),
            changeset_description: description,
            package: None,
        }
    }

    /// The org a retrieve job runs against.
    ///
    /// Changeset runs retrieve from the org they deploy to.
    pub fn retrieve_org(&self) -> &OrgRef {
        match self.mode {
            DeploymentMode::AddToChangeset => &self.destination_org,
            _ => self.source_org.as_ref().unwrap_or(&self.destination_org),
        }
    }

    /// Options actually sent to the deploy endpoint
    pub fn effective_options(&self) -> DeployOptions {
        match self.mode {
            DeploymentMode::AddToChangeset => self.deploy_options.for_changeset(),
            _ => self.deploy_options.clone(),
        }
    }

    /// Component counts per type, for history records
    pub fn metadata_summary(&self) -> MetadataSummary {
        let types = self
            .selected_metadata
            .iter()
            .map(|(name, items)| (name.clone(), items.len()))
            .collect::<BTreeMap<_, _>>();
        MetadataSummary {
            total_items: types.values().sum(),
            types,
        }
    }
}

/// Compact description of what a run deployed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataSummary {
    pub total_items: usize,
    pub types: BTreeMap<String, usize>,
}
