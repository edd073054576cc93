//! Poll-until-terminal driver for remote jobs

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::models::result::{DeployResult, RetrieveStatus};

/// A remote job observation that knows whether the job has finished
pub trait JobStatus {
    fn is_done(&self) -> bool;
}

impl JobStatus for DeployResult {
    fn is_done(&self) -> bool {
        self.done
    }
}

impl JobStatus for RetrieveStatus {
    fn is_done(&self) -> bool {
        self.done
    }
}

/// Poller options
#[derive(Debug, Clone, Copy)]
pub struct Options {
    /// Delay between two status checks
    pub interval: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
        }
    }
}

/// Check a remote job until it reports done.
///
/// Every observation, including the final one, is passed to `on_checked`. An error from
/// `check_fn` ends polling and is returned as-is. There is no timeout; callers cancel by
/// dropping the returned future, which also drops the pending sleep.
pub async fn poll_until_done<T, E, C, Fut, O>(
    mut check_fn: C,
    interval: Duration,
    mut on_checked: O,
) -> Result<T, E>
where
    T: JobStatus,
    C: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    O: FnMut(&T),
{
    let mut checks: u64 = 0;
    loop {
        let status = check_fn().await?;
        checks += 1;
        on_checked(&status);

        if status.is_done() {
            debug!("Job done after {} checks", checks);
            return Ok(status);
        }

        tokio::time::sleep(interval).await;
    }
}
