//! Shared panel state
//!
//! One `SharedState` handle is cloned into every component. Each method takes
//! the write lock once and updates a single field group, so readers never see
//! a half-applied selection. Change events are broadcast after the lock is
//! released.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use crate::{ModelEntry, PanelView, ProviderState, SelectionState, ServerState};

const EVENT_CAPACITY: usize = 64;

/// Cached backend readings that mutations can invalidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Query {
    ActivePath,
    Running,
    Catalog,
    ProviderModels,
}

/// Which cached readings must be refetched. Everything starts stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Staleness {
    pub active_path: bool,
    pub running: bool,
    pub catalog: bool,
    pub provider_models: bool,
}

impl Default for Staleness {
    fn default() -> Self {
        Self {
            active_path: true,
            running: true,
            catalog: true,
            provider_models: true,
        }
    }
}

impl Staleness {
    fn flag(&mut self, query: Query) -> &mut bool {
        match query {
            Query::ActivePath => &mut self.active_path,
            Query::Running => &mut self.running,
            Query::Catalog => &mut self.catalog,
            Query::ProviderModels => &mut self.provider_models,
        }
    }

    pub fn is_stale(&self, query: Query) -> bool {
        match query {
            Query::ActivePath => self.active_path,
            Query::Running => self.running,
            Query::Catalog => self.catalog,
            Query::ProviderModels => self.provider_models,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PanelState {
    pub selection: SelectionState,
    pub server: ServerState,
    /// Last answer of the backend's running probe, if any arrived
    pub backend_running: Option<bool>,
    pub provider: ProviderState,
    pub catalog: Vec<ModelEntry>,
    pub staleness: Staleness,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PanelEvent {
    SelectionChanged { selected: String },
    ServerStateChanged { state: ServerState },
    CatalogChanged { count: usize },
    ProviderModelsChanged { models: Vec<String> },
}

struct Inner {
    state: RwLock<PanelState>,
    seq: AtomicU64,
    events: broadcast::Sender<PanelEvent>,
}

#[derive(Clone)]
pub struct SharedState {
    inner: Arc<Inner>,
}

impl SharedState {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                state: RwLock::new(PanelState::default()),
                seq: AtomicU64::new(0),
                events,
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PanelEvent> {
        self.inner.events.subscribe()
    }

    /// Sequence number for a request about to be issued
    pub fn next_seq(&self) -> u64 {
        self.inner.seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn snapshot(&self) -> PanelState {
        self.read().clone()
    }

    pub fn view(&self) -> PanelView {
        PanelView::from_state(&self.read())
    }

    pub fn server_state(&self) -> ServerState {
        self.read().server
    }

    pub fn catalog(&self) -> Vec<ModelEntry> {
        self.read().catalog.clone()
    }

    pub fn selected(&self) -> String {
        self.read().selection.selected().to_string()
    }

    pub fn provider(&self) -> ProviderState {
        self.read().provider.clone()
    }

    pub fn is_stale(&self, query: Query) -> bool {
        self.read().staleness.is_stale(query)
    }

    pub fn invalidate(&self, query: Query) {
        *self.write().staleness.flag(query) = true;
        debug!(?query, "Invalidated");
    }

    pub fn mark_fresh(&self, query: Query) {
        *self.write().staleness.flag(query) = false;
    }

    // --- Selection ---

    pub fn observe_active_path(&self, seq: u64, path: Option<&Path>) -> bool {
        self.update_selection(seq, |selection| selection.observe(seq, path))
    }

    pub fn select_name(&self, seq: u64, name: &str) -> bool {
        self.update_selection(seq, |selection| selection.select_name(seq, name))
    }

    pub fn select_custom(&self, seq: u64, path: &Path) -> bool {
        self.update_selection(seq, |selection| selection.select_custom(seq, path))
    }

    fn update_selection(&self, seq: u64, f: impl FnOnce(&mut SelectionState) -> bool) -> bool {
        let (applied, changed, selected) = {
            let mut state = self.write();
            let before = state.selection.selected().to_string();
            let applied = f(&mut state.selection);
            let selected = state.selection.selected().to_string();
            (applied, applied && before != selected, selected)
        };

        if !applied {
            debug!(seq, "Dropped out-of-order selection write");
        }
        if changed {
            self.emit(PanelEvent::SelectionChanged { selected });
        }
        applied
    }

    // --- Server ---

    /// Stopped -> Starting. Returns false when a start is in flight or the
    /// server already runs.
    pub fn begin_start(&self) -> bool {
        let began = {
            let mut state = self.write();
            if state.server != ServerState::Stopped {
                false
            } else {
                state.server = ServerState::Starting;
                true
            }
        };
        if began {
            self.emit(PanelEvent::ServerStateChanged {
                state: ServerState::Starting,
            });
        }
        began
    }

    /// Starting -> Running on success, Starting -> Stopped on failure
    pub fn finish_start(&self, succeeded: bool) {
        let next = if succeeded {
            ServerState::Running
        } else {
            ServerState::Stopped
        };
        {
            let mut state = self.write();
            state.server = next;
            if succeeded {
                state.backend_running = Some(true);
            }
        }
        self.emit(PanelEvent::ServerStateChanged { state: next });
    }

    /// Record the backend's running probe. A positive probe adopts a server
    /// started elsewhere; a negative one moves `Running` back to `Stopped` so
    /// the server can be started again. An in-flight start is left alone.
    pub fn record_running(&self, running: bool) {
        let changed = {
            let mut state = self.write();
            state.backend_running = Some(running);
            state.staleness.running = false;
            match (running, state.server) {
                (true, ServerState::Stopped) => {
                    state.server = ServerState::Running;
                    Some(ServerState::Running)
                }
                (false, ServerState::Running) => {
                    state.server = ServerState::Stopped;
                    Some(ServerState::Stopped)
                }
                _ => None,
            }
        };
        if let Some(next) = changed {
            debug!(state = next.label(), "Server state follows backend probe");
            self.emit(PanelEvent::ServerStateChanged { state: next });
        }
    }

    // --- Catalog / provider ---

    pub fn set_catalog(&self, catalog: Vec<ModelEntry>) {
        let count = catalog.len();
        let changed = {
            let mut state = self.write();
            state.staleness.catalog = false;
            if state.catalog == catalog {
                false
            } else {
                state.catalog = catalog;
                true
            }
        };
        if changed {
            self.emit(PanelEvent::CatalogChanged { count });
        }
    }

    pub fn set_provider_models(&self, models: Vec<String>) {
        let changed = {
            let mut state = self.write();
            state.staleness.provider_models = false;
            if state.provider.models == models {
                false
            } else {
                state.provider.models = models.clone();
                true
            }
        };
        if changed {
            self.emit(PanelEvent::ProviderModelsChanged { models });
        }
    }

    fn emit(&self, event: PanelEvent) {
        // No subscribers is fine
        let _ = self.inner.events.send(event);
    }

    fn read(&self) -> RwLockReadGuard<'_, PanelState> {
        self.inner.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, PanelState> {
        self.inner.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}
