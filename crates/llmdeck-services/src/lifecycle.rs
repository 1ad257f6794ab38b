//! Local server lifecycle: Stopped -> Starting -> Running

use std::sync::Arc;

use llmdeck_core::{Query, Result, ServerState, SharedState};
use tracing::{debug, error, info, instrument};

use crate::ModelBackend;

pub struct ServerLifecycle {
    backend: Arc<dyn ModelBackend>,
    state: SharedState,
}

impl ServerLifecycle {
    pub fn new(backend: Arc<dyn ModelBackend>, state: SharedState) -> Self {
        Self { backend, state }
    }

    pub fn state(&self) -> ServerState {
        self.state.server_state()
    }

    /// Start the local server. Does nothing while running or while another
    /// start is in flight. A failed start reverts to `Stopped` and returns the
    /// backend error.
    #[instrument(skip(self))]
    pub async fn start(&self) -> Result<ServerState> {
        if !self.state.begin_start() {
            let current = self.state.server_state();
            debug!(state = current.label(), "Start skipped");
            return Ok(current);
        }

        match self.backend.start_server().await {
            Ok(()) => {
                self.state.finish_start(true);
                self.state.invalidate(Query::Running);
                info!("Local server running");
                Ok(ServerState::Running)
            }
            Err(e) => {
                self.state.finish_start(false);
                error!("Failed to start local server: {}", e);
                Err(e)
            }
        }
    }

    /// Poll the backend's running flag. Errors count as no observation.
    pub async fn refresh_running(&self) -> Option<bool> {
        match self.backend.is_server_running().await {
            Ok(running) => {
                self.state.record_running(running);
                Some(running)
            }
            Err(e) => {
                debug!("Running probe failed: {}", e);
                None
            }
        }
    }
}
