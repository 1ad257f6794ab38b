//! Resolution of model files picked by the user

use std::path::{Path, PathBuf};

use llmdeck_core::{LlmDeckError, Result};

use crate::local::is_gguf;

/// Absolute, symlink-free path of a picked file. Only existing `.gguf` files
/// are accepted.
pub async fn resolve_model_file(path: &Path) -> Result<PathBuf> {
    let resolved = match tokio::fs::canonicalize(path).await {
        Ok(resolved) => resolved,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(LlmDeckError::ModelNotFound(path.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };

    if !resolved.is_file() {
        return Err(LlmDeckError::ModelNotFound(resolved));
    }
    if !is_gguf(&resolved) {
        return Err(LlmDeckError::NotGguf(resolved));
    }
    Ok(resolved)
}
