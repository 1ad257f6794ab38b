//! Selection reconciler
//!
//! Merges three sources into the one selected model the panel shows:
//! user picks (applied optimistically), the backend's active path (applied on
//! every reading, so the backend wins over older local picks), and the
//! `"default"` sentinel when nothing is known.
//!
//! Catalog matching is by display name (basename) only. When several entries
//! share a name the first one in catalog order is used.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use llmdeck_core::{
    find_by_display_name, Query, Result, SharedState, DEFAULT_MODEL_NAME,
};
use tracing::{debug, info, instrument, warn};

use crate::ModelBackend;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectOutcome {
    /// Selection shown and, for backend-backed models, persisted
    Applied,
    /// Name matched nothing selectable; no backend call was made
    Rejected,
}

pub struct SelectionReconciler {
    backend: Arc<dyn ModelBackend>,
    state: SharedState,
}

impl SelectionReconciler {
    pub fn new(backend: Arc<dyn ModelBackend>, state: SharedState) -> Self {
        Self { backend, state }
    }

    pub fn selected(&self) -> String {
        self.state.selected()
    }

    /// Apply a fresh active-path reading. Overwrites any earlier local pick.
    pub fn observe_active_path(&self, path: Option<&Path>) -> bool {
        let seq = self.state.next_seq();
        self.observe_with_seq(seq, path)
    }

    /// Apply a reading whose request was issued with `seq`. Readings issued
    /// before a newer write are dropped.
    pub(crate) fn observe_with_seq(&self, seq: u64, path: Option<&Path>) -> bool {
        let applied = self.state.observe_active_path(seq, path);
        if applied {
            self.state.mark_fresh(Query::ActivePath);
        }
        applied
    }

    /// Fetch the active path and apply it. Fetch errors leave the last
    /// known selection in place.
    pub async fn refresh_active_path(&self) -> Option<PathBuf> {
        let seq = self.state.next_seq();
        match self.backend.get_active_model_path().await {
            Ok(path) => {
                self.observe_with_seq(seq, path.as_deref());
                path
            }
            Err(e) => {
                debug!("Active path fetch failed, keeping last selection: {}", e);
                None
            }
        }
    }

    /// Select by display identity: `"default"` resets to the built-in model,
    /// a catalog name persists that entry's path, anything else is rejected.
    #[instrument(skip(self))]
    pub async fn select_by_display_name(&self, name: &str) -> Result<SelectOutcome> {
        let path = if name == DEFAULT_MODEL_NAME {
            None
        } else {
            let catalog = self.state.catalog();
            let Some(entry) = find_by_display_name(&catalog, name) else {
                warn!(name, "Unknown model, selection ignored");
                return Ok(SelectOutcome::Rejected);
            };
            Some(entry.path().to_path_buf())
        };

        let seq = self.state.next_seq();
        self.state.select_name(seq, name);
        self.set_active_path(path).await?;
        Ok(SelectOutcome::Applied)
    }

    /// Select a file picked from disk, bypassing the catalog
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn select_custom_file(&self, path: PathBuf) -> Result<()> {
        let seq = self.state.next_seq();
        self.state.select_custom(seq, &path);
        self.set_active_path(Some(path)).await
    }

    /// Show a provider model as selected. Local only: the provider keeps no
    /// notion of an active model.
    pub fn select_provider_model(&self, name: &str) -> SelectOutcome {
        let provider = self.state.provider();
        if !self.state.server_state().is_running() || !provider.contains(name) {
            warn!(name, "Provider model not available");
            return SelectOutcome::Rejected;
        }

        let seq = self.state.next_seq();
        self.state.select_name(seq, name);
        SelectOutcome::Applied
    }

    /// Persist the active path. On failure the optimistic selection stays
    /// until the next successful poll replaces it.
    async fn set_active_path(&self, path: Option<PathBuf>) -> Result<()> {
        match self.backend.set_custom_model_path(path.clone()).await {
            Ok(()) => {
                self.state.invalidate(Query::ActivePath);
                self.state.invalidate(Query::Running);
                match &path {
                    Some(path) => info!(path = %path.display(), "Active model set"),
                    None => info!("Active model reset to default"),
                }
                Ok(())
            }
            Err(e) => {
                warn!("Failed to set model path: {}", e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockBackend;
    use crate::ModelCatalog;
    use llmdeck_core::LlmDeckError;

    async fn setup(paths: &[&str]) -> (Arc<MockBackend>, SelectionReconciler, SharedState) {
        let backend = Arc::new(MockBackend::with_catalog(paths));
        let state = SharedState::new();
        ModelCatalog::new(backend.clone(), state.clone())
            .list_catalog()
            .await;
        let reconciler = SelectionReconciler::new(backend.clone(), state.clone());
        (backend, reconciler, state)
    }

    #[tokio::test]
    async fn observed_path_shows_basename() {
        let (_backend, reconciler, _state) = setup(&[]).await;

        for path in ["/models/a.gguf", "/x/y/z/Q4_K_M.gguf", "relative.gguf"] {
            reconciler.observe_active_path(Some(Path::new(path)));
            assert_eq!(reconciler.selected(), display_name_of(path));
        }
    }

    fn display_name_of(path: &str) -> String {
        llmdeck_core::display_name(Path::new(path))
    }

    #[tokio::test]
    async fn observed_none_is_default() {
        let (_backend, reconciler, state) = setup(&[]).await;
        reconciler.observe_active_path(Some(Path::new("/custom/b.gguf")));
        reconciler.observe_active_path(None);

        let snapshot = state.snapshot();
        assert_eq!(snapshot.selection.selected(), DEFAULT_MODEL_NAME);
        assert!(snapshot.selection.custom_path().is_none());
    }

    #[tokio::test]
    async fn catalog_then_custom_banner() {
        let (_backend, reconciler, state) = setup(&["/models/a.gguf"]).await;

        reconciler.observe_active_path(Some(Path::new("/models/a.gguf")));
        let view = state.view();
        assert_eq!(view.selected, "a.gguf");
        assert!(view.custom_model.is_none());

        reconciler.observe_active_path(Some(Path::new("/custom/b.gguf")));
        let view = state.view();
        assert_eq!(view.selected, "b.gguf");
        assert_eq!(view.custom_model, Some(PathBuf::from("/custom/b.gguf")));
    }

    #[tokio::test]
    async fn default_always_resets_path() {
        let (backend, reconciler, _state) = setup(&["/models/a.gguf", "/models/default"]).await;

        let outcome = reconciler.select_by_display_name("default").await.unwrap();

        assert_eq!(outcome, SelectOutcome::Applied);
        assert_eq!(backend.set_path_calls(), vec![None]);
        assert_eq!(reconciler.selected(), DEFAULT_MODEL_NAME);
    }

    #[tokio::test]
    async fn catalog_name_persists_entry_path() {
        let (backend, reconciler, state) = setup(&["/models/a.gguf"]).await;
        state.mark_fresh(Query::ActivePath);

        reconciler.select_by_display_name("a.gguf").await.unwrap();

        assert_eq!(backend.set_path_calls(), vec![Some(PathBuf::from("/models/a.gguf"))]);
        assert_eq!(reconciler.selected(), "a.gguf");
        assert!(state.is_stale(Query::ActivePath));
        assert!(state.is_stale(Query::Running));
    }

    #[tokio::test]
    async fn unknown_name_is_rejected_without_backend_call() {
        let (backend, reconciler, _state) = setup(&["/models/a.gguf"]).await;
        reconciler.observe_active_path(Some(Path::new("/models/a.gguf")));

        let outcome = reconciler.select_by_display_name("nope.gguf").await.unwrap();

        assert_eq!(outcome, SelectOutcome::Rejected);
        assert!(backend.set_path_calls().is_empty());
        assert_eq!(reconciler.selected(), "a.gguf");
    }

    #[tokio::test]
    async fn colliding_names_resolve_deterministically() {
        let (backend, reconciler, _state) = setup(&["/one/m.gguf", "/two/m.gguf"]).await;

        for _ in 0..5 {
            reconciler.select_by_display_name("m.gguf").await.unwrap();
        }

        let calls = backend.set_path_calls();
        assert_eq!(calls.len(), 5);
        assert!(calls.windows(2).all(|pair| pair[0] == pair[1]));
    }

    #[tokio::test]
    async fn failed_custom_selection_kept_until_poll() {
        let (backend, reconciler, state) = setup(&["/models/a.gguf"]).await;
        backend.set_active(Some("/models/a.gguf"));
        reconciler.refresh_active_path().await;
        backend.set(&backend.fail_set_path, true);

        let result = reconciler.select_custom_file(PathBuf::from("/custom/b.gguf")).await;
        assert!(result.is_err());

        let view = state.view();
        assert_eq!(view.selected, "b.gguf");
        assert_eq!(view.custom_model, Some(PathBuf::from("/custom/b.gguf")));

        reconciler.refresh_active_path().await;
        let view = state.view();
        assert_eq!(view.selected, "a.gguf");
        assert!(view.custom_model.is_none());
    }

    #[tokio::test]
    async fn failed_catalog_selection_propagates_and_keeps_name() {
        let (backend, reconciler, state) = setup(&["/models/a.gguf"]).await;
        backend.set_active(Some("/custom/b.gguf"));
        reconciler.refresh_active_path().await;
        state.mark_fresh(Query::Running);
        backend.set(&backend.fail_set_path, true);

        let result = reconciler.select_by_display_name("a.gguf").await;

        assert!(matches!(result, Err(LlmDeckError::Backend(_))));
        assert_eq!(backend.set_path_calls(), vec![Some(PathBuf::from("/models/a.gguf"))]);
        assert_eq!(reconciler.selected(), "a.gguf");
        assert!(!state.is_stale(Query::ActivePath));
        assert!(!state.is_stale(Query::Running));

        reconciler.refresh_active_path().await;
        assert_eq!(reconciler.selected(), "b.gguf");
    }

    #[tokio::test]
    async fn failed_poll_keeps_last_selection() {
        let (backend, reconciler, _state) = setup(&[]).await;
        backend.set_active(Some("/models/a.gguf"));
        reconciler.refresh_active_path().await;

        backend.set(&backend.fail_active_path, true);
        assert!(reconciler.refresh_active_path().await.is_none());
        assert_eq!(reconciler.selected(), "a.gguf");
    }

    #[tokio::test]
    async fn late_reading_does_not_revert_newer_pick() {
        let (_backend, reconciler, state) = setup(&["/models/a.gguf"]).await;

        // Poll request issued, then the user picks a file before it lands
        let poll_seq = state.next_seq();
        reconciler
            .select_custom_file(PathBuf::from("/custom/b.gguf"))
            .await
            .unwrap();

        assert!(!reconciler.observe_with_seq(poll_seq, Some(Path::new("/models/a.gguf"))));
        assert_eq!(reconciler.selected(), "b.gguf");
    }

    #[tokio::test]
    async fn provider_model_requires_running_server() {
        let (_backend, reconciler, state) = setup(&[]).await;
        state.set_provider_models(vec!["llama3.2:3b".into()]);

        assert_eq!(reconciler.select_provider_model("llama3.2:3b"), SelectOutcome::Rejected);

        state.record_running(true);
        assert_eq!(reconciler.select_provider_model("llama3.2:3b"), SelectOutcome::Applied);
        assert_eq!(reconciler.selected(), "llama3.2:3b");
        assert_eq!(reconciler.select_provider_model("mistral"), SelectOutcome::Rejected);
    }
}
