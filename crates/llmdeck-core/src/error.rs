use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlmDeckError {
    #[error("Model not found: {}", .0.display())]
    ModelNotFound(PathBuf),

    #[error("Not a GGUF model file: {}", .0.display())]
    NotGguf(PathBuf),

    #[error("Server failed to start: {0}")]
    ServerStart(String),

    #[error("Local server is not running")]
    ServerNotRunning,

    #[error("Download failed: {0}")]
    Download(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, LlmDeckError>;
