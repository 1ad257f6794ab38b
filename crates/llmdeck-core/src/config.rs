use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{LlmDeckError, Result};

pub const ENV_DATA_DIR: &str = "LLMDECK_DATA_DIR";
pub const ENV_SERVER_BIN: &str = "LLMDECK_SERVER_BIN";
pub const ENV_OLLAMA_HOST: &str = "OLLAMA_HOST";
pub const ENV_MODEL_URL: &str = "LLMDECK_MODEL_URL";

const DEFAULT_MODEL_URL: &str =
    "https://huggingface.co/bartowski/Llama-3.2-3B-Instruct-GGUF/resolve/main/Llama-3.2-3B-Instruct-Q4_K_M.gguf";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmDeckConfig {
    /// Directory scanned for built-in `.gguf` files
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// File name of the bundled default model inside `data_dir`
    #[serde(default = "default_model_file")]
    pub default_model_file: String,
    /// Where `download` fetches the default model from
    #[serde(default = "default_model_url")]
    pub download_url: String,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub ollama: OllamaConfig,
    #[serde(default)]
    pub poll: PollConfig,
}

impl Default for LlmDeckConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            default_model_file: default_model_file(),
            download_url: default_model_url(),
            server: ServerConfig::default(),
            ollama: OllamaConfig::default(),
            poll: PollConfig::default(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("llmdeck")
}

fn default_model_file() -> String {
    "llm.gguf".to_string()
}

fn default_model_url() -> String {
    DEFAULT_MODEL_URL.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub binary: PathBuf,
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("llama-server"),
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl ServerConfig {
    pub fn api_base(&self) -> String {
        format!("http://{}:{}/v1", self.host, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    pub host: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: "http://localhost:11434".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    pub interval_secs: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self { interval_secs: 5 }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

impl LlmDeckConfig {
    /// Load from an optional JSON file, then apply environment overrides.
    /// A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) if path.exists() => {
                let content = std::fs::read_to_string(path)?;
                let config: Self = serde_json::from_str(&content)?;
                info!(path = %path.display(), "Loaded config");
                config
            }
            Some(path) => {
                debug!(path = %path.display(), "Config file not found, using defaults");
                Self::default()
            }
            None => Self::default(),
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn default_model_path(&self) -> PathBuf {
        self.data_dir.join(&self.default_model_file)
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = var(ENV_DATA_DIR).filter(|v| !v.is_empty()) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(bin) = var(ENV_SERVER_BIN).filter(|v| !v.is_empty()) {
            self.server.binary = PathBuf::from(bin);
        }
        if let Some(url) = var(ENV_MODEL_URL).filter(|v| !v.is_empty()) {
            self.download_url = url;
        }
        if let Some(host) = var(ENV_OLLAMA_HOST).filter(|v| !v.is_empty()) {
            self.ollama.host = normalize_host(&host);
        }
    }

    fn validate(&self) -> Result<()> {
        if self.default_model_file.trim().is_empty() {
            return Err(LlmDeckError::Config("default_model_file is empty".into()));
        }
        if !self.download_url.starts_with("http://") && !self.download_url.starts_with("https://") {
            return Err(LlmDeckError::Config(format!(
                "download_url must be an http(s) URL: {}",
                self.download_url
            )));
        }
        if self.server.port == 0 {
            return Err(LlmDeckError::Config("server.port must be non-zero".into()));
        }
        Ok(())
    }
}

/// `OLLAMA_HOST` is often set without a scheme (e.g. `0.0.0.0:11434`)
fn normalize_host(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        return host.to_string();
    }
    format!("http://{}", host)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = LlmDeckConfig::default();
        assert_eq!(config.poll.interval(), Duration::from_secs(5));
        assert_eq!(config.ollama.host, "http://localhost:11434");
        assert!(config.default_model_path().ends_with("llm.gguf"));
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("llmdeck.json");
        std::fs::write(&path, r#"{ "poll": { "interval_secs": 2 }, "data_dir": "/srv/models" }"#)
            .unwrap();

        let config = LlmDeckConfig::load(Some(&path)).unwrap();
        assert_eq!(config.poll.interval_secs, 2);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.default_model_file, "llm.gguf");
    }

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = LlmDeckConfig::load(Some(&dir.path().join("absent.json"))).unwrap();
        assert_eq!(config.server.binary, PathBuf::from("llama-server"));
    }

    #[test]
    fn env_overrides() {
        let mut config = LlmDeckConfig::default();
        config.apply_env(|key| match key {
            ENV_OLLAMA_HOST => Some("0.0.0.0:11434".into()),
            ENV_DATA_DIR => Some("/tmp/models".into()),
            _ => None,
        });

        assert_eq!(config.ollama.host, "http://0.0.0.0:11434");
        assert_eq!(config.data_dir, PathBuf::from("/tmp/models"));
    }

    #[test]
    fn model_url_override_is_validated() {
        let mut config = LlmDeckConfig::default();
        config.apply_env(|key| match key {
            ENV_MODEL_URL => Some("http://mirror.local/llm.gguf".into()),
            _ => None,
        });
        assert_eq!(config.download_url, "http://mirror.local/llm.gguf");
        assert!(config.validate().is_ok());

        config.download_url = "ftp://mirror.local/llm.gguf".into();
        assert!(matches!(config.validate(), Err(LlmDeckError::Config(_))));
    }

    #[test]
    fn zero_port_rejected() {
        let mut config = LlmDeckConfig::default();
        config.server.port = 0;
        assert!(matches!(config.validate(), Err(LlmDeckError::Config(_))));
    }
}
