//! HTTP client implementation

use reqwest::{header, Client, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error};

use crate::errors::DeployError;

/// HTTP client for the remote job gateway
pub struct HttpClient {
    client: Client,
    base_url: String,
    token: Option<SecretString>,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new(base_url: &str, token: Option<SecretString>) -> Result<Self, DeployError> {
        url::Url::parse(base_url)
            .map_err(|e| DeployError::ConfigError(format!("Invalid base URL {}: {}", base_url, e)))?;

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.header(
                header::AUTHORIZATION,
                format!("Bearer {}", token.expose_secret()),
            ),
            None => request,
        }
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, DeployError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {}", url);

        let request = self.authorize(self.client.get(&url));
        Self::send(request, "GET").await
    }

    /// Make a POST request
    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, DeployError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("POST {}", url);

        let request = self.authorize(self.client.post(&url).json(body));
        Self::send(request, "POST").await
    }

    /// Send a request; failures keep the remote error text unaltered
    async fn send<T: DeserializeOwned>(request: RequestBuilder, method: &str) -> Result<T, DeployError> {
        let response = request
            .send()
            .await
            .map_err(|e| DeployError::TransportError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("HTTP {} failed: {} - {}", method, status, body);
            return Err(DeployError::TransportError(remote_message(status, &body)));
        }

        response
            .json()
            .await
            .map_err(|e| DeployError::TransportError(e.to_string()))
    }
}

/// Pick the platform's own message out of an error body, falling back to the raw body
fn remote_message(status: reqwest::StatusCode, body: &str) -> String {
    #[derive(serde::Deserialize)]
    struct ErrorBody {
        message: String,
    }

    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        return parsed.message;
    }
    if let Ok(parsed) = serde_json::from_str::<Vec<ErrorBody>>(body) {
        if let Some(first) = parsed.into_iter().next() {
            return first.message;
        }
    }
    if body.trim().is_empty() {
        return status.to_string();
    }
    body.to_string()
}
