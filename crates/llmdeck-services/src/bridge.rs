//! Bridge to an external model provider (Ollama)
//!
//! Only active while the local server runs. Listing never fails: an empty
//! or failed listing becomes the single `"default"` row.

use std::sync::Arc;

use llmdeck_core::{LlmDeckError, ProviderState, Query, Result, SharedState, DEFAULT_MODEL_NAME};
use tracing::{debug, info, instrument, warn};

use crate::ModelBackend;

pub struct ProviderBridge {
    backend: Arc<dyn ModelBackend>,
    state: SharedState,
}

impl ProviderBridge {
    pub fn new(backend: Arc<dyn ModelBackend>, state: SharedState) -> Self {
        Self { backend, state }
    }

    pub fn is_active(&self) -> bool {
        self.state.server_state().is_running()
    }

    pub fn provider(&self) -> ProviderState {
        self.state.provider()
    }

    /// Best-effort handshake followed by a fresh listing. A failed handshake
    /// is logged and still resolves.
    #[instrument(skip(self))]
    pub async fn connect(&self) -> Result<ProviderState> {
        if !self.is_active() {
            return Err(LlmDeckError::ServerNotRunning);
        }

        match self.backend.probe_provider().await {
            Ok(()) => info!("Provider reachable"),
            Err(e) => warn!("Provider handshake failed: {}", e),
        }

        self.state.invalidate(Query::ProviderModels);
        self.list_models().await;
        Ok(self.state.provider())
    }

    /// Provider model names, or `["default"]` on an empty or failed listing.
    /// Returns nothing without querying while the server is not running.
    pub async fn list_models(&self) -> Vec<String> {
        if !self.is_active() {
            debug!("Bridge inactive, provider not queried");
            return Vec::new();
        }

        let models = match self.backend.list_ollama_models().await {
            Ok(models) if !models.is_empty() => models,
            Ok(_) => {
                debug!("Provider has no models");
                fallback()
            }
            Err(e) => {
                warn!("Failed to fetch provider models: {}", e);
                fallback()
            }
        };

        self.state.set_provider_models(models.clone());
        models
    }
}

fn fallback() -> Vec<String> {
    vec![DEFAULT_MODEL_NAME.to_string()]
}
