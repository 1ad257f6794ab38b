//! Scriptable in-memory backend for component tests

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use llmdeck_core::{LlmDeckError, Result};

use crate::ModelBackend;

#[derive(Default)]
pub struct MockBackend {
    pub active_path: Mutex<Option<PathBuf>>,
    pub catalog: Mutex<Vec<PathBuf>>,
    pub ollama_models: Mutex<Vec<String>>,
    pub running: Mutex<bool>,

    pub fail_active_path: Mutex<bool>,
    pub fail_catalog: Mutex<bool>,
    pub fail_start: Mutex<bool>,
    pub fail_set_path: Mutex<bool>,
    pub fail_ollama: Mutex<bool>,
    pub fail_probe: Mutex<bool>,

    pub start_calls: AtomicUsize,
    pub active_path_calls: AtomicUsize,
    pub catalog_calls: AtomicUsize,
    pub ollama_calls: AtomicUsize,
    pub set_path_calls: Mutex<Vec<Option<PathBuf>>>,
}

impl MockBackend {
    pub fn with_catalog(paths: &[&str]) -> Self {
        let backend = Self::default();
        *backend.catalog.lock().unwrap() = paths.iter().map(PathBuf::from).collect();
        backend
    }

    pub fn set(&self, flag: &Mutex<bool>, value: bool) {
        *flag.lock().unwrap() = value;
    }

    pub fn set_active(&self, path: Option<&str>) {
        *self.active_path.lock().unwrap() = path.map(PathBuf::from);
    }

    pub fn set_path_calls(&self) -> Vec<Option<PathBuf>> {
        self.set_path_calls.lock().unwrap().clone()
    }

    pub fn start_calls(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn ollama_calls(&self) -> usize {
        self.ollama_calls.load(Ordering::SeqCst)
    }

    fn fails(flag: &Mutex<bool>) -> bool {
        *flag.lock().unwrap()
    }
}

#[async_trait]
impl ModelBackend for MockBackend {
    async fn get_active_model_path(&self) -> Result<Option<PathBuf>> {
        self.active_path_calls.fetch_add(1, Ordering::SeqCst);
        if Self::fails(&self.fail_active_path) {
            return Err(LlmDeckError::Backend("active path unavailable".into()));
        }
        Ok(self.active_path.lock().unwrap().clone())
    }

    async fn list_available_gguf_models(&self) -> Result<Vec<PathBuf>> {
        self.catalog_calls.fetch_add(1, Ordering::SeqCst);
        if Self::fails(&self.fail_catalog) {
            return Err(LlmDeckError::Backend("catalog unavailable".into()));
        }
        Ok(self.catalog.lock().unwrap().clone())
    }

    async fn start_server(&self) -> Result<()> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        if Self::fails(&self.fail_start) {
            return Err(LlmDeckError::ServerStart("boom".into()));
        }
        *self.running.lock().unwrap() = true;
        Ok(())
    }

    async fn set_custom_model_path(&self, path: Option<PathBuf>) -> Result<()> {
        self.set_path_calls.lock().unwrap().push(path.clone());
        if Self::fails(&self.fail_set_path) {
            return Err(LlmDeckError::Backend("cannot set model path".into()));
        }
        *self.active_path.lock().unwrap() = path;
        Ok(())
    }

    async fn list_ollama_models(&self) -> Result<Vec<String>> {
        self.ollama_calls.fetch_add(1, Ordering::SeqCst);
        if Self::fails(&self.fail_ollama) {
            return Err(LlmDeckError::Provider("connection refused".into()));
        }
        Ok(self.ollama_models.lock().unwrap().clone())
    }

    async fn is_server_running(&self) -> Result<bool> {
        Ok(*self.running.lock().unwrap())
    }

    async fn probe_provider(&self) -> Result<()> {
        if Self::fails(&self.fail_probe) {
            return Err(LlmDeckError::Provider("unreachable".into()));
        }
        Ok(())
    }
}
