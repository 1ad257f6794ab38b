//! Read-only snapshot of what the settings panel renders

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{PanelState, ServerState, DEFAULT_MODEL_NAME};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelView {
    pub selected: String,
    /// Set when the selected model is not one of the built-in files
    pub custom_model: Option<PathBuf>,
    /// `"default"` followed by the catalog display names
    pub gguf_models: Vec<String>,
    /// Provider rows, only while the local server runs and the bridge is connected
    pub provider_models: Vec<String>,
    pub provider_connected: bool,
    pub server: ServerState,
}

impl PanelView {
    pub fn from_state(state: &PanelState) -> Self {
        let gguf_models = std::iter::once(DEFAULT_MODEL_NAME.to_string())
            .chain(state.catalog.iter().map(|entry| entry.display_name()))
            .collect();

        let bridge_active = state.server.is_running() && state.provider.connected();
        let provider_models = match bridge_active {
            true => state.provider.models.clone(),
            false => Vec::new(),
        };

        Self {
            selected: state.selection.selected().to_string(),
            custom_model: state
                .selection
                .custom_banner(&state.catalog)
                .map(|path| path.to_path_buf()),
            gguf_models,
            provider_models,
            provider_connected: bridge_active,
            server: state.server,
        }
    }

    /// Every selectable row, in display order, without duplicates
    pub fn rendered_model_list(&self) -> Vec<String> {
        let mut rows: Vec<String> = Vec::new();
        for name in self.gguf_models.iter().chain(&self.provider_models) {
            if !rows.contains(name) {
                rows.push(name.clone());
            }
        }
        rows
    }
}
