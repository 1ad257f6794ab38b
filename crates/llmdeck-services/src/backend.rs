//! Contract of the backend inference service the panel talks to

use std::path::PathBuf;

use async_trait::async_trait;
use llmdeck_core::Result;

#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Model file the backend is configured to serve
    async fn get_active_model_path(&self) -> Result<Option<PathBuf>>;

    /// Built-in model files
    async fn list_available_gguf_models(&self) -> Result<Vec<PathBuf>>;

    async fn start_server(&self) -> Result<()>;

    /// `None` reverts to the built-in default model
    async fn set_custom_model_path(&self, path: Option<PathBuf>) -> Result<()>;

    /// Model names of the external provider
    async fn list_ollama_models(&self) -> Result<Vec<String>>;

    async fn is_server_running(&self) -> Result<bool>;

    /// Handshake with the external provider
    async fn probe_provider(&self) -> Result<()> {
        Ok(())
    }
}
