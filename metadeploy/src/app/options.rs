//! Application configuration options

use std::time::Duration;

use crate::deploy::orchestrator::OrchestratorOptions;
use crate::logs::LogOptions;
use crate::storage::layout::StorageLayout;
use crate::storage::settings::Settings;
use crate::workers::poller;

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Storage layout paths
    pub layout: StorageLayout,

    /// Remote job gateway base URL
    pub remote_base_url: String,

    /// Maximum history records kept
    pub history_max_items: usize,

    /// Logging configuration
    pub logging: LogOptions,

    /// Orchestrator configuration
    pub orchestrator: OrchestratorOptions,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self::from_settings(&Settings::default(), StorageLayout::default())
    }
}

impl AppOptions {
    /// Build runtime options from a settings file
    pub fn from_settings(settings: &Settings, layout: StorageLayout) -> Self {
        let logging = LogOptions {
            log_level: settings.log_level.clone(),
            stdout: true,
            log_dir: settings
                .file_logs
                .then(|| layout.logs_dir().path().to_path_buf()),
            json_format: settings.json_logs,
        };

        let orchestrator = OrchestratorOptions {
            retrieve_poll: poller::Options {
                interval: Duration::from_millis(settings.polling.retrieve_interval_ms),
            },
            deploy_poll: poller::Options {
                interval: Duration::from_millis(settings.polling.deploy_interval_ms),
            },
            api_version: settings.remote.api_version.clone(),
            keep_artifacts: settings.history.keep_artifacts,
        };

        Self {
            layout,
            remote_base_url: settings.remote.base_url.clone(),
            history_max_items: settings.history.max_items,
            logging,
            orchestrator,
        }
    }
}
