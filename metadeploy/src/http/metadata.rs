//! Metadata job gateway client

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::deploy::manifest::PackageManifest;
use crate::errors::DeployError;
use crate::http::client::HttpClient;
use crate::models::deployment::{DeployOptions, OrgRef};
use crate::models::result::{DeployResult, RetrieveStatus};
use crate::remote::{JobId, RemoteJobClient};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RetrieveRequestBody<'a> {
    manifest: &'a PackageManifest,
    package_xml: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeployRequestBody<'a> {
    zip_file: String,
    options: &'a DeployOptions,
}

#[derive(Debug, Deserialize)]
struct JobAccepted {
    id: JobId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RetrieveStatusBody {
    #[serde(flatten)]
    status: RetrieveStatus,
    #[serde(default)]
    zip_file: Option<String>,
}

/// Remote job client speaking JSON to a metadata job gateway
pub struct HttpJobClient {
    http: HttpClient,
}

impl HttpJobClient {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    fn path(org: &OrgRef, tail: &str) -> String {
        format!("/orgs/{}/metadata/{}", org.id, tail)
    }
}

#[async_trait]
impl RemoteJobClient for HttpJobClient {
    async fn retrieve(&self, org: &OrgRef, manifest: &PackageManifest) -> Result<JobId, DeployError> {
        let body = RetrieveRequestBody {
            manifest,
            package_xml: manifest.to_xml(),
        };
        let accepted: JobAccepted = self.http.post(&Self::path(org, "retrieve"), &body).await?;
        Ok(accepted.id)
    }

    async fn check_retrieve(&self, org: &OrgRef, job_id: &JobId) -> Result<RetrieveStatus, DeployError> {
        let body: RetrieveStatusBody = self
            .http
            .get(&Self::path(org, &format!("retrieve/{}", job_id)))
            .await?;

        let mut status = body.status;
        if let Some(encoded) = body.zip_file {
            let bytes = STANDARD.decode(encoded.as_bytes()).map_err(|e| {
                DeployError::TransportError(format!("Retrieve {} returned an invalid zip payload: {}", job_id, e))
            })?;
            status.zip_bytes = Some(bytes);
        }
        Ok(status)
    }

    async fn deploy(
        &self,
        org: &OrgRef,
        zip_bytes: &[u8],
        options: &DeployOptions,
    ) -> Result<JobId, DeployError> {
        let body = DeployRequestBody {
            zip_file: STANDARD.encode(zip_bytes),
            options,
        };
        let accepted: JobAccepted = self.http.post(&Self::path(org, "deploy"), &body).await?;
        Ok(accepted.id)
    }

    async fn check_deploy(&self, org: &OrgRef, job_id: &JobId) -> Result<DeployResult, DeployError> {
        self.http
            .get(&Self::path(org, &format!("deploy/{}", job_id)))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retrieve_status_body_decodes_zip() {
        let json = r#"{"id": "09S1", "done": true, "fileManifest": ["classes/Foo.cls"], "zipFile": "UEsFBg=="}"#;
        let body: RetrieveStatusBody = serde_json::from_str(json).unwrap();
        assert!(body.status.done);
        assert_eq!(body.status.file_manifest, vec!["classes/Foo.cls".to_string()]);
        assert_eq!(STANDARD.decode(body.zip_file.unwrap()).unwrap(), b"PK\x05\x06");
    }

    #[test]
    fn test_paths_are_scoped_to_org() {
        let org = OrgRef::new("00D000000000001", Default::default());
        assert_eq!(
            HttpJobClient::path(&org, "deploy/0Af1"),
            "/orgs/00D000000000001/metadata/deploy/0Af1"
        );
    }
}
