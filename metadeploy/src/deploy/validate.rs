//! Pre-flight validation of deployment requests

use crate::errors::DeployError;
use crate::models::deployment::{DeployOptions, DeploymentMode, DeploymentRequest, OrgRef, OrgType, TestLevel};

/// Check deploy options against the destination org
pub fn validate_options(options: &DeployOptions, destination: &OrgRef) -> Result<(), DeployError> {
    if options.test_level == TestLevel::RunSpecifiedTests
        && options.run_tests.iter().all(|test| test.trim().is_empty())
    {
        return Err(DeployError::ValidationError(
            "RunSpecifiedTests requires at least one test class".to_string(),
        ));
    }

    if destination.org_type == OrgType::Production && !options.rollback_on_error {
        return Err(DeployError::ValidationError(format!(
            "Deployments to production org {} must roll back on error",
            destination.label
        )));
    }

    Ok(())
}

/// Check a request before any remote call is made
pub fn validate_request(request: &DeploymentRequest) -> Result<(), DeployError> {
    match request.mode {
        DeploymentMode::PackageUpload => {
            if request.package.as_ref().map_or(true, |bytes| bytes.is_empty()) {
                return Err(DeployError::ValidationError(
                    "A package file is required for package uploads".to_string(),
                ));
            }
        }
        DeploymentMode::OrgToOrg => {
            let source = request.source_org.as_ref().ok_or_else(|| {
                DeployError::ValidationError("A source org is required".to_string())
            })?;
            if source.id == request.destination_org.id {
                return Err(DeployError::ValidationError(
                    "Source and destination orgs must differ".to_string(),
                ));
            }
        }
        DeploymentMode::AddToChangeset => {
            if request
                .changeset_name
                .as_deref()
                .map_or(true, |name| name.trim().is_empty())
            {
                return Err(DeployError::ValidationError(
                    "A changeset name is required".to_string(),
                ));
            }
        }
    }

    if request.mode.requires_retrieve()
        && request.selected_metadata.values().all(|items| items.is_empty())
    {
        return Err(DeployError::ValidationError(
            "Select at least one metadata component".to_string(),
        ));
    }

    validate_options(&request.effective_options(), &request.destination_org)
}
