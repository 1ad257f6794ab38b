//! Selection state - which model the panel shows as selected
//!
//! Every write carries a sequence number taken when the originating request
//! was issued. Writes older than the last applied one are dropped, so a poll
//! response that was in flight while the user picked a model cannot revert
//! that pick. A poll issued after the pick still overwrites it.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::model::{display_name, find_by_display_name, ModelEntry, DEFAULT_MODEL_NAME};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionState {
    selected: String,
    custom_path: Option<PathBuf>,
    applied_seq: u64,
}

impl Default for SelectionState {
    fn default() -> Self {
        Self {
            selected: DEFAULT_MODEL_NAME.to_string(),
            custom_path: None,
            applied_seq: 0,
        }
    }
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected(&self) -> &str {
        &self.selected
    }

    /// Last path reported by the backend or picked from disk
    pub fn custom_path(&self) -> Option<&Path> {
        self.custom_path.as_deref()
    }

    pub fn applied_seq(&self) -> u64 {
        self.applied_seq
    }

    pub fn is_default(&self) -> bool {
        self.selected == DEFAULT_MODEL_NAME
    }

    /// Apply a backend reading of the active path. `None` resets to the default.
    pub fn observe(&mut self, seq: u64, path: Option<&Path>) -> bool {
        match path {
            Some(path) => self.apply(seq, display_name(path), Some(path.to_path_buf())),
            None => self.apply(seq, DEFAULT_MODEL_NAME.to_string(), None),
        }
    }

    /// Optimistically select by display name, leaving the custom path alone
    pub fn select_name(&mut self, seq: u64, name: &str) -> bool {
        let custom_path = self.custom_path.clone();
        self.apply(seq, name.to_string(), custom_path)
    }

    /// Optimistically select a file picked from disk
    pub fn select_custom(&mut self, seq: u64, path: &Path) -> bool {
        self.apply(seq, display_name(path), Some(path.to_path_buf()))
    }

    /// Path for the "custom model" banner: only when the selection names the
    /// custom file and matches no catalog entry
    pub fn custom_banner<'a>(&'a self, catalog: &[ModelEntry]) -> Option<&'a Path> {
        let path = self.custom_path.as_deref()?;
        if self.is_default()
            || display_name(path) != self.selected
            || find_by_display_name(catalog, &self.selected).is_some()
        {
            return None;
        }
        Some(path)
    }

    fn apply(&mut self, seq: u64, selected: String, custom_path: Option<PathBuf>) -> bool {
        if seq < self.applied_seq {
            return false;
        }
        self.selected = selected;
        self.custom_path = custom_path;
        self.applied_seq = seq;
        true
    }
}
