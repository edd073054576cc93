//! Settings file management

use secrecy::SecretString;
use serde::{Deserialize, Deserializer, Serialize};

use crate::errors::DeployError;
use crate::filesys::file::File;
use crate::logs::LogLevel;

/// metadeploy settings
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit JSON logs
    #[serde(default)]
    pub json_logs: bool,

    /// Also write logs to the logs directory
    #[serde(default)]
    pub file_logs: bool,

    /// Remote job gateway configuration
    #[serde(default)]
    pub remote: RemoteSettings,

    /// Polling configuration
    #[serde(default)]
    pub polling: PollingSettings,

    /// History configuration
    #[serde(default)]
    pub history: HistorySettings,
}

/// Remote metadata job gateway settings
#[derive(Debug, Serialize, Deserialize)]
pub struct RemoteSettings {
    /// Base URL for the job gateway
    #[serde(default = "default_remote_url")]
    pub base_url: String,

    /// Metadata API version used in generated manifests
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Bearer token for the gateway
    #[serde(default, skip_serializing, deserialize_with = "deserialize_secret")]
    pub access_token: Option<SecretString>,
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.map(SecretString::from))
}

fn default_remote_url() -> String {
    "http://localhost:3333/api".to_string()
}

fn default_api_version() -> String {
    "60.0".to_string()
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            base_url: default_remote_url(),
            api_version: default_api_version(),
            access_token: None,
        }
    }
}

/// Polling intervals per call site
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingSettings {
    #[serde(default = "default_poll_interval")]
    pub retrieve_interval_ms: u64,

    #[serde(default = "default_poll_interval")]
    pub deploy_interval_ms: u64,
}

fn default_poll_interval() -> u64 {
    2000
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            retrieve_interval_ms: default_poll_interval(),
            deploy_interval_ms: default_poll_interval(),
        }
    }
}

/// History retention settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistorySettings {
    /// Maximum number of records kept
    #[serde(default = "default_max_items")]
    pub max_items: usize,

    /// Keep package zips alongside records
    #[serde(default = "default_true")]
    pub keep_artifacts: bool,
}

fn default_max_items() -> usize {
    crate::history::MAX_HISTORY_ITEMS
}

fn default_true() -> bool {
    true
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            max_items: default_max_items(),
            keep_artifacts: true,
        }
    }
}

impl Settings {
    /// Load settings, falling back to defaults when the file is missing
    pub async fn load(file: &File) -> Result<Self, DeployError> {
        if !file.exists().await {
            return Ok(Self::default());
        }
        let settings: Settings = file.read_json().await?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check settings values
    pub fn validate(&self) -> Result<(), DeployError> {
        url::Url::parse(&self.remote.base_url).map_err(|e| {
            DeployError::ConfigError(format!("Invalid remote base_url {}: {}", self.remote.base_url, e))
        })?;
        if self.history.max_items == 0 {
            return Err(DeployError::ConfigError(
                "history.max_items must be at least 1".to_string(),
            ));
        }
        if self.polling.retrieve_interval_ms == 0 || self.polling.deploy_interval_ms == 0 {
            return Err(DeployError::ConfigError(
                "polling intervals must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_defaults_from_empty_json() {
        let settings: Settings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings.log_level, LogLevel::Info);
        assert_eq!(settings.polling.deploy_interval_ms, 2000);
        assert_eq!(settings.history.max_items, 500);
        assert!(settings.history.keep_artifacts);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_settings_reject_bad_url() {
        let settings: Settings =
            serde_json::from_str(r#"{"remote": {"base_url": "not a url"}}"#).unwrap();
        assert!(matches!(settings.validate(), Err(DeployError::ConfigError(_))));
    }
}
