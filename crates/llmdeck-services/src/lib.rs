mod backend;
mod bridge;
mod catalog;
mod file_select;
mod lifecycle;
mod local;
mod ollama;
mod panel;
mod poller;
mod reconciler;

#[cfg(test)]
mod mock;

pub use backend::ModelBackend;
pub use bridge::ProviderBridge;
pub use catalog::ModelCatalog;
pub use file_select::resolve_model_file;
pub use lifecycle::ServerLifecycle;
pub use local::LocalBackend;
pub use ollama::{OllamaClient, OllamaError, OllamaModel};
pub use panel::{ModelPanel, Mounted};
pub use poller::StatusPoller;
pub use reconciler::{SelectOutcome, SelectionReconciler};

// Re-export core types so callers only need this crate
pub use llmdeck_core::{
    LlmDeckConfig, LlmDeckError, ModelEntry, PanelEvent, PanelView, ProviderState, Result,
    ServerState, SharedState, DEFAULT_MODEL_NAME,
};
