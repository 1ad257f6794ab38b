//! Built-in model catalog

use std::sync::Arc;

use llmdeck_core::{ModelEntry, SharedState};
use tracing::{debug, warn};

use crate::ModelBackend;

pub struct ModelCatalog {
    backend: Arc<dyn ModelBackend>,
    state: SharedState,
}

impl ModelCatalog {
    pub fn new(backend: Arc<dyn ModelBackend>, state: SharedState) -> Self {
        Self { backend, state }
    }

    /// Fetch the catalog in backend order. A backend error degrades to an
    /// empty catalog rather than failing the panel.
    pub async fn list_catalog(&self) -> Vec<ModelEntry> {
        let entries = match self.backend.list_available_gguf_models().await {
            Ok(paths) => paths.into_iter().map(ModelEntry::new).collect(),
            Err(e) => {
                warn!("Failed to fetch GGUF models: {}", e);
                Vec::new()
            }
        };

        debug!(count = entries.len(), "Catalog refreshed");
        self.state.set_catalog(entries.clone());
        entries
    }

    /// Last fetched catalog
    pub fn entries(&self) -> Vec<ModelEntry> {
        self.state.catalog()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockBackend;
    use llmdeck_core::Query;

    #[tokio::test]
    async fn maps_paths_to_entries_in_order() {
        let backend = Arc::new(MockBackend::with_catalog(&["/models/z.gguf", "/models/a.gguf"]));
        let state = SharedState::new();
        let catalog = ModelCatalog::new(backend, state.clone());

        let entries = catalog.list_catalog().await;
        let names: Vec<_> = entries.iter().map(|e| e.display_name()).collect();

        assert_eq!(names, vec!["z.gguf", "a.gguf"]);
        assert_eq!(catalog.entries(), entries);
        assert!(!state.is_stale(Query::Catalog));
    }

    #[tokio::test]
    async fn backend_error_yields_empty_catalog() {
        let backend = Arc::new(MockBackend::with_catalog(&["/models/a.gguf"]));
        backend.set(&backend.fail_catalog, true);
        let catalog = ModelCatalog::new(backend, SharedState::new());

        assert!(catalog.list_catalog().await.is_empty());
    }
}
