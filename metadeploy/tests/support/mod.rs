//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::{Cursor, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use metadeploy::deploy::manifest::PackageManifest;
use metadeploy::deploy::notify::{NotificationLevel, Notifier};
use metadeploy::deploy::orchestrator::{Orchestrator, OrchestratorOptions};
use metadeploy::errors::DeployError;
use metadeploy::history::HistoryStore;
use metadeploy::models::deployment::{
    ComponentRef, DeployOptions, MetadataSelection, OrgRef, OrgType,
};
use metadeploy::models::result::{DeployDetails, DeployResult, DeployStatus, RetrieveStatus};
use metadeploy::remote::{JobId, RemoteJobClient};
use metadeploy::storage::memory::MemoryStore;
use metadeploy::workers::poller;

/// Remote client that replays scripted job observations.
///
/// When a script runs dry the last observation is repeated, so a finished job keeps
/// reporting the same snapshot.
#[derive(Default)]
pub struct ScriptedRemote {
    retrieve_checks: Mutex<VecDeque<Result<RetrieveStatus, String>>>,
    deploy_checks: Mutex<VecDeque<Result<DeployResult, String>>>,
    last_deploy_check: Mutex<Option<DeployResult>>,
    deploy_submit_error: Mutex<Option<String>>,

    pub retrieve_calls: AtomicUsize,
    pub check_retrieve_calls: AtomicUsize,
    pub deploy_calls: AtomicUsize,
    pub check_deploy_calls: AtomicUsize,

    pub manifests: Mutex<Vec<PackageManifest>>,
    pub deployed: Mutex<Vec<(Vec<u8>, DeployOptions)>>,
}

impl ScriptedRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Retrieve job reports `pending` unfinished checks, then returns `zip`
    pub fn with_retrieve(self, pending: usize, zip: Vec<u8>) -> Self {
        {
            let mut checks = self.retrieve_checks.lock().unwrap();
            for _ in 0..pending {
                checks.push_back(Ok(retrieve_status(false, None)));
            }
            checks.push_back(Ok(retrieve_status(true, Some(zip))));
        }
        self
    }

    /// Retrieve check number `nth` (1-based) fails with `message`
    pub fn with_retrieve_error_on(self, nth: usize, message: &str) -> Self {
        {
            let mut checks = self.retrieve_checks.lock().unwrap();
            for _ in 1..nth {
                checks.push_back(Ok(retrieve_status(false, None)));
            }
            checks.push_back(Err(message.to_string()));
        }
        self
    }

    /// Deploy checks return `results` in order
    pub fn with_deploy(self, results: Vec<DeployResult>) -> Self {
        self.deploy_checks
            .lock()
            .unwrap()
            .extend(results.into_iter().map(Ok));
        self
    }

    /// Deploy check fails with `message` after the scripted results
    pub fn with_deploy_check_error(self, message: &str) -> Self {
        self.deploy_checks
            .lock()
            .unwrap()
            .push_back(Err(message.to_string()));
        self
    }

    /// The deploy submission itself fails with `message`
    pub fn with_deploy_submit_error(self, message: &str) -> Self {
        *self.deploy_submit_error.lock().unwrap() = Some(message.to_string());
        self
    }

    pub fn total_calls(&self) -> usize {
        self.retrieve_calls.load(Ordering::SeqCst)
            + self.check_retrieve_calls.load(Ordering::SeqCst)
            + self.deploy_calls.load(Ordering::SeqCst)
            + self.check_deploy_calls.load(Ordering::SeqCst)
    }

    pub fn calls(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    /// Package bytes and options of the last deploy submission
    pub fn last_deployed(&self) -> Option<(Vec<u8>, DeployOptions)> {
        self.deployed.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl RemoteJobClient for ScriptedRemote {
    async fn retrieve(&self, _org: &OrgRef, manifest: &PackageManifest) -> Result<JobId, DeployError> {
        self.retrieve_calls.fetch_add(1, Ordering::SeqCst);
        self.manifests.lock().unwrap().push(manifest.clone());
        Ok(JobId::from("09S000000000001"))
    }

    async fn check_retrieve(&self, _org: &OrgRef, _job_id: &JobId) -> Result<RetrieveStatus, DeployError> {
        self.check_retrieve_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.retrieve_checks.lock().unwrap().pop_front();
        match next {
            Some(Ok(status)) => Ok(status),
            Some(Err(message)) => Err(DeployError::TransportError(message)),
            None => Ok(retrieve_status(false, None)),
        }
    }

    async fn deploy(
        &self,
        _org: &OrgRef,
        zip_bytes: &[u8],
        options: &DeployOptions,
    ) -> Result<JobId, DeployError> {
        self.deploy_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.deploy_submit_error.lock().unwrap().clone() {
            return Err(DeployError::TransportError(message));
        }
        self.deployed
            .lock()
            .unwrap()
            .push((zip_bytes.to_vec(), options.clone()));
        Ok(JobId::from("0Af000000000001"))
    }

    async fn check_deploy(&self, _org: &OrgRef, _job_id: &JobId) -> Result<DeployResult, DeployError> {
        self.check_deploy_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.deploy_checks.lock().unwrap().pop_front();
        let mut last = self.last_deploy_check.lock().unwrap();
        match next {
            Some(Ok(result)) => {
                *last = Some(result.clone());
                Ok(result)
            }
            Some(Err(message)) => Err(DeployError::TransportError(message)),
            None => Ok(last
                .clone()
                .unwrap_or_else(|| deploy_result(DeployStatus::InProgress, 0, 0, 0))),
        }
    }
}

/// Notifier that keeps every notification
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(NotificationLevel, String, String)>>,
}

impl Notifier for RecordingNotifier {
    fn notify(&self, level: NotificationLevel, title: &str, body: &str) {
        self.sent
            .lock()
            .unwrap()
            .push((level, title.to_string(), body.to_string()));
    }
}

pub struct Harness {
    pub remote: Arc<ScriptedRemote>,
    pub store: Arc<MemoryStore>,
    pub history: Arc<HistoryStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub orchestrator: Orchestrator,
}

/// Orchestrator over `remote` and an empty memory store, polling every millisecond
pub fn harness(remote: ScriptedRemote) -> Harness {
    harness_with_interval(remote, Duration::from_millis(1))
}

pub fn harness_with_interval(remote: ScriptedRemote, interval: Duration) -> Harness {
    let remote = Arc::new(remote);
    let store = Arc::new(MemoryStore::new());
    let history = Arc::new(HistoryStore::new(store.clone()));
    let notifier = Arc::new(RecordingNotifier::default());
    let options = OrchestratorOptions {
        retrieve_poll: poller::Options { interval },
        deploy_poll: poller::Options { interval },
        ..Default::default()
    };
    let orchestrator = Orchestrator::new(
        remote.clone(),
        history.clone(),
        notifier.clone(),
        options,
    );

    Harness {
        remote,
        store,
        history,
        notifier,
        orchestrator,
    }
}

pub fn sandbox(id: &str) -> OrgRef {
    OrgRef::new(id, OrgType::Sandbox)
}

pub fn production(id: &str) -> OrgRef {
    OrgRef::new(id, OrgType::Production)
}

/// Selection from `(type, full name)` pairs
pub fn selection(items: &[(&str, &str)]) -> MetadataSelection {
    let mut selection = MetadataSelection::new();
    for (type_name, full_name) in items {
        selection
            .entry(type_name.to_string())
            .or_default()
            .push(ComponentRef::new(*full_name));
    }
    selection
}

pub fn retrieve_status(done: bool, zip: Option<Vec<u8>>) -> RetrieveStatus {
    RetrieveStatus {
        id: "09S000000000001".to_string(),
        done,
        zip_bytes: zip,
        ..Default::default()
    }
}

pub fn deploy_result(status: DeployStatus, total: u32, deployed: u32, errors: u32) -> DeployResult {
    let done = !matches!(
        status,
        DeployStatus::Pending | DeployStatus::InProgress | DeployStatus::Canceling
    );
    DeployResult {
        id: "0Af000000000001".to_string(),
        done,
        status,
        check_only: false,
        components_total: total,
        components_deployed: deployed,
        components_errors: errors,
        tests_total: 0,
        tests_completed: 0,
        tests_errors: 0,
        error_message: None,
        details: DeployDetails::default(),
    }
}

/// Build a zip from `(name, contents)` pairs
pub fn zip_package(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, contents) in entries {
        writer.start_file(*name, SimpleFileOptions::default()).unwrap();
        writer.write_all(contents.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// A retrieved package with a manifest for `selection`
pub fn retrieved_package(selection: &MetadataSelection) -> Vec<u8> {
    let manifest = PackageManifest::from_selection(selection, "60.0").to_xml();
    zip_package(&[
        ("unpackaged/package.xml", manifest.as_str()),
        ("unpackaged/classes/Foo.cls", "public class Foo {}"),
    ])
}
