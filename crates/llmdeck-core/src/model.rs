//! Model entries and display identity
//!
//! Models are identified in the panel by the basename of their path. Two
//! different paths can share a basename, so lookups by display name resolve
//! to the first entry in catalog order.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Display identity of the built-in default model. On the wire the default is
/// always encoded as "no custom path" (`None`), never as this string.
pub const DEFAULT_MODEL_NAME: &str = "default";

/// A model file known to the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelEntry {
    path: PathBuf,
}

impl ModelEntry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Basename of the path, computed on every call
    pub fn display_name(&self) -> String {
        display_name(&self.path)
    }
}

/// Basename of a model path, lossily converted to UTF-8.
///
/// Paths without a file name component (e.g. `/`) fall back to the full path
/// string so the entry still has a non-empty identity.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// First catalog entry whose display name equals `name`
pub fn find_by_display_name<'a>(catalog: &'a [ModelEntry], name: &str) -> Option<&'a ModelEntry> {
    catalog.iter().find(|entry| entry.display_name() == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_is_basename() {
        let entry = ModelEntry::new("/models/llama-3.2-3b.gguf");
        assert_eq!(entry.display_name(), "llama-3.2-3b.gguf");
    }

    #[test]
    fn display_name_without_file_name_uses_path() {
        assert_eq!(display_name(Path::new("/")), "/");
    }

    #[test]
    fn lookup_picks_first_on_collision() {
        let catalog = vec![
            ModelEntry::new("/a/m.gguf"),
            ModelEntry::new("/b/m.gguf"),
            ModelEntry::new("/c/other.gguf"),
        ];

        let found = find_by_display_name(&catalog, "m.gguf").unwrap();
        assert_eq!(found.path(), Path::new("/a/m.gguf"));
        assert!(find_by_display_name(&catalog, "missing.gguf").is_none());
    }
}
