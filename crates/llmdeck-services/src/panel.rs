//! Model panel - single entry point wiring the components together
//!
//! All components share one `SharedState`; the panel forwards user actions to
//! the component that owns them and, after a successful mutation, refetches
//! whatever that mutation invalidated.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use llmdeck_core::{
    LlmDeckConfig, ModelEntry, PanelEvent, PanelView, ProviderState, Result, ServerState,
    SharedState,
};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::file_select::resolve_model_file;
use crate::{
    LocalBackend, ModelBackend, ModelCatalog, ProviderBridge, SelectOutcome, SelectionReconciler,
    ServerLifecycle, StatusPoller,
};

pub struct ModelPanel {
    state: SharedState,
    catalog: ModelCatalog,
    lifecycle: ServerLifecycle,
    reconciler: SelectionReconciler,
    bridge: ProviderBridge,
    poller: Arc<StatusPoller>,
}

impl ModelPanel {
    pub fn new(backend: Arc<dyn ModelBackend>, poll_interval: Duration) -> Self {
        let state = SharedState::new();
        Self {
            catalog: ModelCatalog::new(backend.clone(), state.clone()),
            lifecycle: ServerLifecycle::new(backend.clone(), state.clone()),
            reconciler: SelectionReconciler::new(backend.clone(), state.clone()),
            bridge: ProviderBridge::new(backend.clone(), state.clone()),
            poller: Arc::new(StatusPoller::new(backend, state.clone(), poll_interval)),
            state,
        }
    }

    /// Panel over the local backend described by `config`
    pub fn local(config: &LlmDeckConfig) -> (Self, Arc<LocalBackend>) {
        let backend = Arc::new(LocalBackend::new(config));
        let panel = Self::new(backend.clone(), config.poll.interval());
        (panel, backend)
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    pub fn view(&self) -> PanelView {
        self.state.view()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PanelEvent> {
        self.state.subscribe()
    }

    /// Start polling; polling stops when the returned handle is unmounted or dropped
    pub fn mount(&self) -> Mounted {
        let token = CancellationToken::new();
        let handle = self.poller.clone().spawn(token.clone());
        info!("Panel mounted");
        Mounted { token, handle }
    }

    /// One poll tick, outside of the interval
    pub async fn refresh(&self) {
        self.poller.tick().await;
    }

    pub async fn list_catalog(&self) -> Vec<ModelEntry> {
        self.catalog.list_catalog().await
    }

    /// Start the local server. Returns the state after the follow-up
    /// running probe.
    pub async fn start_server(&self) -> Result<ServerState> {
        self.lifecycle.start().await?;
        self.poller.refresh_stale().await;
        Ok(self.state.server_state())
    }

    pub fn observe_active_path(&self, path: Option<&Path>) {
        self.reconciler.observe_active_path(path);
    }

    pub async fn select(&self, name: &str) -> Result<SelectOutcome> {
        let outcome = self.reconciler.select_by_display_name(name).await?;
        if outcome == SelectOutcome::Applied {
            self.poller.refresh_stale().await;
        }
        Ok(outcome)
    }

    /// Resolve a picked file and make it the active model
    pub async fn select_custom_file(&self, picked: &Path) -> Result<PathBuf> {
        let path = resolve_model_file(picked).await?;
        self.reconciler.select_custom_file(path.clone()).await?;
        self.poller.refresh_stale().await;
        Ok(path)
    }

    pub fn select_provider_model(&self, name: &str) -> SelectOutcome {
        self.reconciler.select_provider_model(name)
    }

    pub async fn connect_provider(&self) -> Result<ProviderState> {
        self.bridge.connect().await
    }

    pub async fn provider_models(&self) -> Vec<String> {
        self.bridge.list_models().await
    }
}

/// Running poller of a mounted panel
pub struct Mounted {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl Mounted {
    pub async fn unmount(mut self) {
        self.token.cancel();
        let _ = (&mut self.handle).await;
        info!("Panel unmounted");
    }
}

impl Drop for Mounted {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
