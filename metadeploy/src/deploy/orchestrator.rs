//! Deployment orchestrator
//!
//! Drives one [`DeploymentRequest`] through retrieve, package, deploy and history on a
//! spawned task. Callers observe the run through a [`RunHandle`].

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::deploy::fsm::{OrchestrationState, Phase, RunEvent, RunFsm};
use crate::deploy::manifest::{rewrite_for_changeset, PackageManifest};
use crate::deploy::notify::{NotificationLevel, Notifier};
use crate::deploy::validate::validate_request;
use crate::errors::{DeployError, ErrorKind};
use crate::history::HistoryStore;
use crate::models::deployment::{DeploymentMode, DeploymentRequest};
use crate::models::history::HistoryRecord;
use crate::models::result::{DeployResult, DeployStatus, RetrieveStatus};
use crate::remote::RemoteJobClient;
use crate::utils::generate_uuid;
use crate::workers::poller::{self, poll_until_done};

/// Orchestrator options
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// Retrieve job polling
    pub retrieve_poll: poller::Options,

    /// Deploy job polling
    pub deploy_poll: poller::Options,

    /// Metadata API version for generated manifests
    pub api_version: String,

    /// Keep package zips in history
    pub keep_artifacts: bool,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            retrieve_poll: poller::Options {
                interval: Duration::from_secs(2),
            },
            deploy_poll: poller::Options {
                interval: Duration::from_secs(2),
            },
            api_version: "60.0".to_string(),
            keep_artifacts: true,
        }
    }
}

/// Deployment orchestrator
pub struct Orchestrator {
    remote: Arc<dyn RemoteJobClient>,
    history: Arc<HistoryStore>,
    notifier: Arc<dyn Notifier>,
    options: OrchestratorOptions,
}

impl Orchestrator {
    /// Create a new orchestrator
    pub fn new(
        remote: Arc<dyn RemoteJobClient>,
        history: Arc<HistoryStore>,
        notifier: Arc<dyn Notifier>,
        options: OrchestratorOptions,
    ) -> Self {
        Self {
            remote,
            history,
            notifier,
            options,
        }
    }

    /// Validate `request` and start a run.
    ///
    /// Validation failures are returned here and never reach the remote org.
    pub fn start(&self, request: DeploymentRequest) -> Result<RunHandle, DeployError> {
        validate_request(&request)?;

        let id = generate_uuid();
        let fsm = RunFsm::new(request.mode);
        let (state_tx, state_rx) = watch::channel(fsm.state().clone());
        let (cancel_tx, cancel_rx) = oneshot::channel();

        info!(
            "[{}] Starting {} run to org {}",
            id, request.mode, request.destination_org.id
        );

        let run = Run {
            id: id.clone(),
            request,
            remote: self.remote.clone(),
            history: self.history.clone(),
            notifier: self.notifier.clone(),
            options: self.options.clone(),
            fsm,
            state_tx,
            started_at: Utc::now(),
        };
        let task = tokio::spawn(run.execute(cancel_rx));

        Ok(RunHandle {
            id,
            state_rx,
            cancel_tx: Mutex::new(Some(cancel_tx)),
            task,
        })
    }

    /// Stop polling a run. The remote job itself keeps going.
    pub fn cancel(&self, handle: &RunHandle) {
        handle.cancel();
    }

    /// Call `on_change` with the current state and after every change until the run ends.
    ///
    /// Rapid successive changes may be coalesced; the terminal state is always delivered.
    pub fn subscribe<F>(&self, handle: &RunHandle, mut on_change: F) -> JoinHandle<()>
    where
        F: FnMut(&OrchestrationState) + Send + 'static,
    {
        let mut state_rx = handle.watch();
        tokio::spawn(async move {
            loop {
                let state = state_rx.borrow_and_update().clone();
                on_change(&state);
                if state.phase.is_terminal() {
                    return;
                }
                if state_rx.changed().await.is_err() {
                    return;
                }
            }
        })
    }
}

/// Handle to a started run.
///
/// Dropping the handle cancels the run.
pub struct RunHandle {
    id: String,
    state_rx: watch::Receiver<OrchestrationState>,
    cancel_tx: Mutex<Option<oneshot::Sender<()>>>,
    task: JoinHandle<OrchestrationState>,
}

impl RunHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current state snapshot
    pub fn state(&self) -> OrchestrationState {
        self.state_rx.borrow().clone()
    }

    /// Receiver for state changes
    pub fn watch(&self) -> watch::Receiver<OrchestrationState> {
        self.state_rx.clone()
    }

    /// Stop polling the run
    pub fn cancel(&self) {
        let sender = self.cancel_tx.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(sender) = sender {
            info!("[{}] Cancel requested", self.id);
            let _ = sender.send(());
        }
    }

    /// Wait for the run to reach a terminal phase
    pub async fn wait(self) -> OrchestrationState {
        let RunHandle {
            id,
            state_rx,
            cancel_tx: _cancel_tx,
            task,
        } = self;

        match task.await {
            Ok(state) => state,
            Err(e) => {
                error!("[{}] Run task failed: {}", id, e);
                let state = state_rx.borrow().clone();
                state
            }
        }
    }
}

impl fmt::Debug for RunHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunHandle")
            .field("id", &self.id)
            .field("phase", &self.state_rx.borrow().phase)
            .finish()
    }
}

/// State of one executing run, owned by its task
struct Run {
    id: String,
    request: DeploymentRequest,
    remote: Arc<dyn RemoteJobClient>,
    history: Arc<HistoryStore>,
    notifier: Arc<dyn Notifier>,
    options: OrchestratorOptions,
    fsm: RunFsm,
    state_tx: watch::Sender<OrchestrationState>,
    started_at: DateTime<Utc>,
}

impl Run {
    async fn execute(mut self, cancel_rx: oneshot::Receiver<()>) -> OrchestrationState {
        let outcome = {
            let steps = self.drive();
            tokio::select! {
                result = steps => result,
                _ = cancel_rx => Err(DeployError::Canceled),
            }
        };

        match outcome {
            Ok(result) => self.finish(result).await,
            Err(e) => self.fail(e).await,
        }

        self.fsm.state().clone()
    }

    async fn drive(&mut self) -> Result<DeployResult, DeployError> {
        let package = if self.request.mode.requires_retrieve() {
            let retrieved = self.retrieve().await?;
            match (self.request.mode, self.request.changeset_name.as_deref()) {
                (DeploymentMode::AddToChangeset, Some(name)) => rewrite_for_changeset(
                    &retrieved,
                    name,
                    self.request.changeset_description.as_deref(),
                )?,
                _ => retrieved,
            }
        } else {
            self.request.package.clone().unwrap_or_default()
        };

        self.transition(RunEvent::PackageReady(package))?;
        self.deploy().await
    }

    async fn retrieve(&mut self) -> Result<Vec<u8>, DeployError> {
        let org = self.request.retrieve_org().clone();
        let manifest =
            PackageManifest::from_selection(&self.request.selected_metadata, &self.options.api_version);
        let remote = self.remote.clone();

        self.transition(RunEvent::RetrieveRequested)?;
        let job_id = remote.retrieve(&org, &manifest).await?;
        info!("[{}] Retrieve job {} queued on org {}", self.id, job_id, org.id);
        self.transition(RunEvent::RetrieveQueued(job_id.clone()))?;

        let status = poll_until_done(
            || remote.check_retrieve(&org, &job_id),
            self.options.retrieve_poll.interval,
            |status: &RetrieveStatus| {
                debug!("[{}] Retrieve {} done={}", self.id, status.id, status.done);
                if !status.done {
                    if let Err(e) = self.transition(RunEvent::RetrieveChecked) {
                        warn!("[{}] {}", self.id, e);
                    }
                }
            },
        )
        .await?;

        if let Some(message) = status.error {
            return Err(DeployError::TransportError(message));
        }
        match status.zip_bytes {
            Some(bytes) if !bytes.is_empty() => Ok(bytes),
            _ => Err(DeployError::TransportError(format!(
                "Retrieve job {} finished without a package",
                job_id
            ))),
        }
    }

    async fn deploy(&mut self) -> Result<DeployResult, DeployError> {
        let org = self.request.destination_org.clone();
        let options = self.request.effective_options();
        let remote = self.remote.clone();

        let job_id = {
            let package = self.fsm.package().ok_or_else(|| {
                DeployError::InvalidTransition("Deploying without a package".to_string())
            })?;
            remote.deploy(&org, package, &options).await?
        };
        info!("[{}] Deploy job {} queued on org {}", self.id, job_id, org.id);
        self.transition(RunEvent::DeployQueued(job_id.clone()))?;

        poll_until_done(
            || remote.check_deploy(&org, &job_id),
            self.options.deploy_poll.interval,
            |result: &DeployResult| {
                debug!(
                    "[{}] Deploy {} {:?}: {}/{} components, {}/{} tests",
                    self.id,
                    result.id,
                    result.status,
                    result.components_deployed,
                    result.components_total,
                    result.tests_completed,
                    result.tests_total
                );
                if !result.done {
                    if let Err(e) = self.transition(RunEvent::DeployChecked(result.clone())) {
                        warn!("[{}] {}", self.id, e);
                    }
                }
            },
        )
        .await
    }

    /// Record the finished deploy, then publish the terminal state
    async fn finish(&mut self, result: DeployResult) {
        let record = self.history_record(result.status, Some(result.clone()), None);
        self.append_history(record).await;

        let summary = result.summary();
        let level = match result.status {
            DeployStatus::Succeeded => NotificationLevel::Success,
            DeployStatus::SucceededPartial => NotificationLevel::Warning,
            _ => NotificationLevel::Error,
        };

        if let Err(e) = self.transition(RunEvent::DeployChecked(result)) {
            error!("[{}] {}", self.id, e);
        }
        info!("[{}] {}", self.id, summary);
        self.notifier.notify(level, self.title(), &summary);
    }

    /// Record deploy-phase failures, then publish the error state.
    ///
    /// Failures before `Deploying` touched nothing on the destination and leave no history;
    /// locally canceled runs leave none either.
    async fn fail(&mut self, err: DeployError) {
        let phase = self.fsm.phase();
        let kind = err.kind();
        let message = err.to_string();

        if kind == ErrorKind::Canceled {
            warn!("[{}] Run canceled during {:?}; the remote job is not canceled", self.id, phase);
        } else {
            error!("[{}] Run failed during {:?}: {}", self.id, phase, message);
        }

        if phase == Phase::Deploying && kind != ErrorKind::Canceled {
            let last_result = self.fsm.state().last_result.clone();
            let record = self.history_record(DeployStatus::Failed, last_result, Some(message.clone()));
            self.append_history(record).await;
            self.notifier.notify(NotificationLevel::Error, self.title(), &message);
        }

        if let Err(e) = self.transition(RunEvent::Failed { kind, message }) {
            error!("[{}] {}", self.id, e);
        }
    }

    async fn append_history(&self, record: HistoryRecord) {
        let artifact = if self.options.keep_artifacts {
            self.fsm.package()
        } else {
            None
        };
        self.history.append(record, artifact).await;
    }

    fn history_record(
        &self,
        status: DeployStatus,
        result: Option<DeployResult>,
        error_message: Option<String>,
    ) -> HistoryRecord {
        let request = &self.request;
        HistoryRecord {
            key: HistoryRecord::make_key(&request.destination_org.id, request.mode, self.started_at),
            mode: request.mode,
            source_org: request
                .mode
                .requires_retrieve()
                .then(|| request.retrieve_org().clone()),
            destination_org: request.destination_org.clone(),
            start: self.started_at,
            finish: Utc::now(),
            status,
            deploy_options: request.effective_options(),
            metadata_summary: request.metadata_summary(),
            result,
            error_message,
            changeset_name: request.changeset_name.clone(),
            artifact_key: None,
            artifact_sha256: None,
        }
    }

    fn title(&self) -> &'static str {
        if self.request.effective_options().check_only {
            "Validation finished"
        } else {
            "Deployment finished"
        }
    }

    fn transition(&mut self, event: RunEvent) -> Result<Phase, DeployError> {
        let before = self.fsm.phase();
        let after = self.fsm.process(event)?;
        if before != after {
            info!("[{}] {:?} -> {:?}", self.id, before, after);
        }
        self.state_tx.send_replace(self.fsm.state().clone());
        Ok(after)
    }
}
