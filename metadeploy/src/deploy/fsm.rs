//! Finite state machine for one deployment run

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{DeployError, ErrorKind};
use crate::models::deployment::DeploymentMode;
use crate::models::result::DeployResult;
use crate::remote::JobId;

/// Run phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// No remote work started yet
    Idle,

    /// Retrieve job requested from the source org
    Submitting,

    /// Retrieve job polled until the package is ready
    Preparing,

    /// Package submitted to the destination org and deploy job polled
    Deploying,

    /// Deploy job finished; the result is final
    Done,

    /// Run ended with an error
    Error,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Done | Phase::Error)
    }
}

/// Why a run ended in [`Phase::Error`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetail {
    pub kind: ErrorKind,

    /// Message as reported by the failing component
    pub message: String,

    /// Phase the run was in when it failed
    pub phase: Phase,
}

/// Observable state of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestrationState {
    pub phase: Phase,
    pub remote_job_id: Option<JobId>,
    pub last_polled_at: Option<DateTime<Utc>>,
    pub last_result: Option<DeployResult>,
    pub error: Option<ErrorDetail>,
}

impl Default for OrchestrationState {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            remote_job_id: None,
            last_polled_at: None,
            last_result: None,
            error: None,
        }
    }
}

/// Run event
#[derive(Debug, Clone)]
pub enum RunEvent {
    /// A retrieve job is about to be requested
    RetrieveRequested,

    /// The source org accepted the retrieve job
    RetrieveQueued(JobId),

    /// The retrieve job was checked and is still running
    RetrieveChecked,

    /// Package bytes are available for deploy
    PackageReady(Vec<u8>),

    /// The destination org accepted the deploy job
    DeployQueued(JobId),

    /// The deploy job was checked; a `done` result finishes the run
    DeployChecked(DeployResult),

    /// A step failed
    Failed { kind: ErrorKind, message: String },
}

impl RunEvent {
    fn name(&self) -> &'static str {
        match self {
            RunEvent::RetrieveRequested => "RetrieveRequested",
            RunEvent::RetrieveQueued(_) => "RetrieveQueued",
            RunEvent::RetrieveChecked => "RetrieveChecked",
            RunEvent::PackageReady(_) => "PackageReady",
            RunEvent::DeployQueued(_) => "DeployQueued",
            RunEvent::DeployChecked(_) => "DeployChecked",
            RunEvent::Failed { .. } => "Failed",
        }
    }
}

/// Run FSM.
///
/// Mode-specific edges: package uploads go straight from `Idle` to `Deploying`, every other
/// mode must pass through `Submitting` and `Preparing`.
#[derive(Debug, Clone)]
pub struct RunFsm {
    mode: DeploymentMode,
    state: OrchestrationState,
    package: Option<Vec<u8>>,
}

impl RunFsm {
    /// Create a new FSM in idle state
    pub fn new(mode: DeploymentMode) -> Self {
        Self {
            mode,
            state: OrchestrationState::default(),
            package: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    /// Get the observable state
    pub fn state(&self) -> &OrchestrationState {
        &self.state
    }

    /// Package captured on entry to `Deploying`
    pub fn package(&self) -> Option<&[u8]> {
        self.package.as_deref()
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: RunEvent) -> Result<Phase, DeployError> {
        let phase = self.state.phase;
        let retrieves = self.mode.requires_retrieve();

        let next = match (phase, event) {
            (Phase::Idle, RunEvent::RetrieveRequested) if retrieves => Phase::Submitting,

            (Phase::Submitting, RunEvent::RetrieveQueued(job_id)) => {
                self.state.remote_job_id = Some(job_id);
                Phase::Preparing
            }

            (Phase::Preparing, RunEvent::RetrieveChecked) => {
                self.state.last_polled_at = Some(Utc::now());
                Phase::Preparing
            }

            (Phase::Idle, RunEvent::PackageReady(bytes)) if !retrieves && !bytes.is_empty() => {
                self.package = Some(bytes);
                Phase::Deploying
            }
            (Phase::Preparing, RunEvent::PackageReady(bytes)) if !bytes.is_empty() => {
                self.state.last_polled_at = Some(Utc::now());
                self.state.remote_job_id = None;
                self.package = Some(bytes);
                Phase::Deploying
            }

            (Phase::Deploying, RunEvent::DeployQueued(job_id)) if self.state.remote_job_id.is_none() => {
                self.state.remote_job_id = Some(job_id);
                Phase::Deploying
            }

            (Phase::Deploying, RunEvent::DeployChecked(result)) if self.state.remote_job_id.is_some() => {
                let done = result.done;
                self.state.last_polled_at = Some(Utc::now());
                self.state.last_result = Some(result);
                if done {
                    Phase::Done
                } else {
                    Phase::Deploying
                }
            }

            (phase, RunEvent::Failed { kind, message }) if !phase.is_terminal() => {
                self.state.error = Some(ErrorDetail { kind, message, phase });
                Phase::Error
            }

            // Invalid transitions
            (phase, event) => {
                return Err(DeployError::InvalidTransition(format!(
                    "{:?} -> {} ({} run)",
                    phase,
                    event.name(),
                    self.mode
                )));
            }
        };

        self.state.phase = next;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::result::{DeployDetails, DeployStatus};

    fn result(done: bool) -> DeployResult {
        DeployResult {
            id: "0Af1".to_string(),
            done,
            status: if done { DeployStatus::Succeeded } else { DeployStatus::InProgress },
            check_only: false,
            components_total: 1,
            components_deployed: u32::from(done),
            components_errors: 0,
            tests_total: 0,
            tests_completed: 0,
            tests_errors: 0,
            error_message: None,
            details: DeployDetails::default(),
        }
    }

    #[test]
    fn test_fsm_retrieve_flow() {
        let mut fsm = RunFsm::new(DeploymentMode::OrgToOrg);
        assert_eq!(fsm.phase(), Phase::Idle);

        fsm.process(RunEvent::RetrieveRequested).unwrap();
        assert_eq!(fsm.phase(), Phase::Submitting);

        fsm.process(RunEvent::RetrieveQueued(JobId::from("09S1"))).unwrap();
        assert_eq!(fsm.phase(), Phase::Preparing);
        assert_eq!(fsm.state().remote_job_id, Some(JobId::from("09S1")));

        fsm.process(RunEvent::RetrieveChecked).unwrap();
        assert!(fsm.state().last_polled_at.is_some());

        fsm.process(RunEvent::PackageReady(vec![1, 2, 3])).unwrap();
        assert_eq!(fsm.phase(), Phase::Deploying);
        assert_eq!(fsm.package(), Some(&[1u8, 2, 3][..]));
        assert!(fsm.state().remote_job_id.is_none());

        fsm.process(RunEvent::DeployQueued(JobId::from("0Af1"))).unwrap();
        fsm.process(RunEvent::DeployChecked(result(false))).unwrap();
        assert_eq!(fsm.phase(), Phase::Deploying);

        fsm.process(RunEvent::DeployChecked(result(true))).unwrap();
        assert_eq!(fsm.phase(), Phase::Done);
        assert!(fsm.state().last_result.as_ref().unwrap().done);
    }

    #[test]
    fn test_fsm_package_needs_bytes() {
        let mut fsm = RunFsm::new(DeploymentMode::OrgToOrg);
        fsm.process(RunEvent::RetrieveRequested).unwrap();
        fsm.process(RunEvent::RetrieveQueued(JobId::from("09S1"))).unwrap();

        assert!(fsm.process(RunEvent::PackageReady(Vec::new())).is_err());
        assert_eq!(fsm.phase(), Phase::Preparing);
    }

    #[test]
    fn test_fsm_terminal_phases_reject_events() {
        let mut fsm = RunFsm::new(DeploymentMode::PackageUpload);
        fsm.process(RunEvent::Failed {
            kind: ErrorKind::Transport,
            message: "boom".to_string(),
        })
        .unwrap();

        assert!(fsm
            .process(RunEvent::Failed {
                kind: ErrorKind::Transport,
                message: "again".to_string(),
            })
            .is_err());
        assert_eq!(fsm.state().error.as_ref().unwrap().message, "boom");
    }
}
