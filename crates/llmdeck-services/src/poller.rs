//! Status poller - refreshes volatile backend state on a fixed interval
//!
//! Every tick reads the active path and the running flag, then refetches
//! whatever a mutation invalidated. Between ticks, `refresh_stale` refetches
//! only the invalidated readings. Errors are absorbed; the next tick simply
//! tries again.

use std::sync::Arc;
use std::time::Duration;

use llmdeck_core::{Query, SharedState};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::{ModelBackend, ModelCatalog, ProviderBridge, SelectionReconciler, ServerLifecycle};

pub struct StatusPoller {
    interval: Duration,
    state: SharedState,
    catalog: ModelCatalog,
    lifecycle: ServerLifecycle,
    reconciler: SelectionReconciler,
    bridge: ProviderBridge,
}

impl StatusPoller {
    pub fn new(backend: Arc<dyn ModelBackend>, state: SharedState, interval: Duration) -> Self {
        Self {
            interval,
            catalog: ModelCatalog::new(backend.clone(), state.clone()),
            lifecycle: ServerLifecycle::new(backend.clone(), state.clone()),
            reconciler: SelectionReconciler::new(backend.clone(), state.clone()),
            bridge: ProviderBridge::new(backend, state.clone()),
            state,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    #[instrument(skip(self))]
    pub async fn tick(&self) {
        self.reconciler.refresh_active_path().await;
        self.lifecycle.refresh_running().await;

        if self.state.is_stale(Query::Catalog) {
            self.catalog.list_catalog().await;
        }
        if self.bridge.is_active() && self.state.is_stale(Query::ProviderModels) {
            self.bridge.list_models().await;
        }
    }

    /// Refetch only the readings a mutation invalidated
    pub async fn refresh_stale(&self) {
        if self.state.is_stale(Query::ActivePath) {
            self.reconciler.refresh_active_path().await;
        }
        if self.state.is_stale(Query::Running) {
            self.lifecycle.refresh_running().await;
        }
        if self.state.is_stale(Query::Catalog) {
            self.catalog.list_catalog().await;
        }
        if self.bridge.is_active() && self.state.is_stale(Query::ProviderModels) {
            self.bridge.list_models().await;
        }
    }

    /// Tick until `token` is cancelled. The first tick fires immediately.
    pub async fn run(&self, token: CancellationToken) {
        info!(interval_ms = self.interval.as_millis() as u64, "Status poller started");
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = interval.tick() => self.tick().await,
            }
        }
        debug!("Status poller stopped");
    }

    pub fn spawn(self: Arc<Self>, token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(token).await })
    }
}
