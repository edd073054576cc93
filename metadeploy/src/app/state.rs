//! Application state management

use std::sync::Arc;

use secrecy::SecretString;
use tracing::info;

use crate::app::options::AppOptions;
use crate::deploy::notify::{LogNotifier, Notifier};
use crate::deploy::orchestrator::Orchestrator;
use crate::errors::DeployError;
use crate::history::HistoryStore;
use crate::http::client::HttpClient;
use crate::http::metadata::HttpJobClient;
use crate::remote::RemoteJobClient;
use crate::storage::fs::FileStore;
use crate::storage::KeyValueStore;

/// Main application state
pub struct AppState {
    /// Deployment history
    pub history: Arc<HistoryStore>,

    /// Deployment orchestrator
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    /// Initialize application state backed by the storage layout and the HTTP gateway
    pub async fn init(options: &AppOptions, access_token: Option<SecretString>) -> Result<Self, DeployError> {
        info!("Initializing application state...");

        options.layout.setup().await?;
        let store = FileStore::new(options.layout.store_dir());
        store.setup().await?;

        let http = HttpClient::new(&options.remote_base_url, access_token)?;
        let remote = HttpJobClient::new(http);

        Ok(Self::with_components(
            options,
            Arc::new(store),
            Arc::new(remote),
            Arc::new(LogNotifier),
        ))
    }

    /// Assemble state from explicit components
    pub fn with_components(
        options: &AppOptions,
        store: Arc<dyn KeyValueStore>,
        remote: Arc<dyn RemoteJobClient>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let history = Arc::new(HistoryStore::with_capacity(store, options.history_max_items));
        let orchestrator = Arc::new(Orchestrator::new(
            remote,
            history.clone(),
            notifier,
            options.orchestrator.clone(),
        ));

        Self {
            history,
            orchestrator,
        }
    }
}
