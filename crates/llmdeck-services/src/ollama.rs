use std::time::Duration;

use llmdeck_core::LlmDeckError;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error, info, instrument};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum OllamaError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Ollama returned status {0}")]
    Status(reqwest::StatusCode),
    #[error("Connection refused - is Ollama running?")]
    ConnectionRefused,
}

impl From<OllamaError> for LlmDeckError {
    fn from(e: OllamaError) -> Self {
        LlmDeckError::Provider(e.to_string())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OllamaModel {
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    models: Vec<OllamaModel>,
}

#[derive(Debug, Clone)]
pub struct OllamaClient {
    host: String,
    client: reqwest::Client,
}

impl OllamaClient {
    pub fn new(host: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            host: host.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Ollama answers its root path with "Ollama is running"
    #[instrument(skip(self), fields(host = %self.host))]
    pub async fn probe(&self) -> Result<(), OllamaError> {
        let resp = self
            .client
            .get(&self.host)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        if !resp.status().is_success() {
            return Err(OllamaError::Status(resp.status()));
        }
        debug!("Ollama reachable");
        Ok(())
    }

    #[instrument(skip(self), fields(host = %self.host))]
    pub async fn list_models(&self) -> Result<Vec<OllamaModel>, OllamaError> {
        let url = format!("{}/api/tags", self.host);
        debug!("Fetching models from Ollama API");

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        if !resp.status().is_success() {
            error!(status = %resp.status(), "Failed to list models");
            return Err(OllamaError::Status(resp.status()));
        }

        let tags: TagsResponse = resp.json().await?;
        info!(count = tags.models.len(), "Fetched models from Ollama");
        Ok(tags.models)
    }

    pub async fn list_model_names(&self) -> Result<Vec<String>, OllamaError> {
        let models = self.list_models().await?;
        let names: Vec<String> = models.into_iter().map(|m| m.name).collect();
        debug!(models = ?names, "Model names");
        Ok(names)
    }
}

/// Map reqwest errors to OllamaError, detecting connection failures
fn map_reqwest_error(e: reqwest::Error) -> OllamaError {
    if e.is_connect() {
        debug!("Connection refused - Ollama not running?");
        return OllamaError::ConnectionRefused;
    }
    error!("HTTP error: {}", e);
    OllamaError::Http(e)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_trailing_slash_trimmed() {
        let client = OllamaClient::new("http://localhost:11434/");
        assert_eq!(client.host(), "http://localhost:11434");
    }

    #[test]
    fn tags_response_parses() {
        let body = r#"{"models":[{"name":"llama3.2:3b","size":2019393189,"digest":"a80c"},{"name":"qwen2.5:7b"}]}"#;
        let tags: TagsResponse = serde_json::from_str(body).unwrap();
        let names: Vec<_> = tags.models.into_iter().map(|m| m.name).collect();
        assert_eq!(names, vec!["llama3.2:3b", "qwen2.5:7b"]);
    }
}
