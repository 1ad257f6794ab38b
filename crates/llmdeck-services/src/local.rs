//! Local backend: GGUF files on disk, a llama.cpp-compatible server process,
//! and Ollama as the external provider.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use llmdeck_core::{LlmDeckConfig, LlmDeckError, Result, ServerConfig};
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::{ModelBackend, OllamaClient};

struct ServerHandle {
    child: Child,
    api_base: String,
    model_path: PathBuf,
}

#[derive(Default)]
struct LocalState {
    custom_model_path: Option<PathBuf>,
    server: Option<ServerHandle>,
    download_task: Option<JoinHandle<Result<()>>>,
}

impl LocalState {
    fn is_downloading(&self) -> bool {
        self.download_task
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}

pub struct LocalBackend {
    data_dir: PathBuf,
    default_model_path: PathBuf,
    download_url: String,
    server_config: ServerConfig,
    ollama: OllamaClient,
    http: reqwest::Client,
    state: Mutex<LocalState>,
}

impl LocalBackend {
    pub fn new(config: &LlmDeckConfig) -> Self {
        Self {
            data_dir: config.data_dir.clone(),
            default_model_path: config.default_model_path(),
            download_url: config.download_url.clone(),
            server_config: config.server.clone(),
            ollama: OllamaClient::new(&config.ollama.host),
            http: reqwest::Client::builder()
                .connect_timeout(CONNECT_TIMEOUT)
                .build()
                .unwrap_or_default(),
            state: Mutex::new(LocalState::default()),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn default_model_path(&self) -> &Path {
        &self.default_model_path
    }

    /// Custom path if one is set, otherwise the bundled default
    pub async fn active_model_path(&self) -> PathBuf {
        let state = self.state.lock().await;
        state
            .custom_model_path
            .clone()
            .unwrap_or_else(|| self.default_model_path.clone())
    }

    /// OpenAI-compatible base URL of the running server
    pub async fn api_base(&self) -> Option<String> {
        let state = self.state.lock().await;
        state.server.as_ref().map(|s| s.api_base.clone())
    }

    pub async fn is_model_downloaded(&self) -> Result<bool> {
        Ok(tokio::fs::try_exists(&self.default_model_path).await?)
    }

    pub async fn is_model_downloading(&self) -> bool {
        self.state.lock().await.is_downloading()
    }

    /// Fetch the default model in the background. Percent progress goes to
    /// `progress` until the task ends; the file only appears once complete.
    #[instrument(skip(self, progress), fields(url = %self.download_url))]
    pub async fn download_model(&self, progress: mpsc::Sender<u8>) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.is_downloading() {
            return Err(LlmDeckError::Download(
                "a download is already in progress".into(),
            ));
        }

        let client = self.http.clone();
        let url = self.download_url.clone();
        let dest = self.default_model_path.clone();
        info!(dest = %dest.display(), "Model download started");

        state.download_task = Some(tokio::spawn(async move {
            let result = download_file(&client, &url, &dest, &progress).await;
            match &result {
                Ok(()) => info!(dest = %dest.display(), "Model downloaded"),
                Err(e) => {
                    error!("Model download failed: {}", e);
                    let _ = tokio::fs::remove_file(part_path(&dest)).await;
                }
            }
            result
        }));
        Ok(())
    }

    /// Result of the last download, once it finishes. Ok when none was started.
    pub async fn wait_for_download(&self) -> Result<()> {
        let task = self.state.lock().await.download_task.take();
        match task {
            Some(task) => task
                .await
                .map_err(|e| LlmDeckError::Download(e.to_string()))?,
            None => Ok(()),
        }
    }

    #[instrument(skip(self))]
    pub async fn stop_server(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        let Some(server) = state.server.take() else {
            debug!("No server to stop");
            return Ok(());
        };
        shutdown(server).await
    }
}

#[async_trait]
impl ModelBackend for LocalBackend {
    async fn get_active_model_path(&self) -> Result<Option<PathBuf>> {
        Ok(Some(self.active_model_path().await))
    }

    #[instrument(skip(self), fields(dir = %self.data_dir.display()))]
    async fn list_available_gguf_models(&self) -> Result<Vec<PathBuf>> {
        let dir = self.data_dir.clone();
        let models = tokio::task::spawn_blocking(move || scan_gguf(&dir))
            .await
            .map_err(|e| LlmDeckError::Backend(e.to_string()))?;
        debug!(count = models.len(), "Scanned GGUF models");
        Ok(models)
    }

    #[instrument(skip(self))]
    async fn start_server(&self) -> Result<()> {
        let mut state = self.state.lock().await;

        if let Some(server) = state.server.as_mut() {
            match server.child.try_wait()? {
                None => {
                    debug!(api_base = %server.api_base, "Server already running");
                    return Ok(());
                }
                Some(status) => {
                    warn!(%status, "Previous server exited");
                    state.server = None;
                }
            }
        }

        let model_path = state
            .custom_model_path
            .clone()
            .unwrap_or_else(|| self.default_model_path.clone());

        if !tokio::fs::try_exists(&model_path).await? {
            return Err(LlmDeckError::ModelNotFound(model_path));
        }

        let mut child = Command::new(&self.server_config.binary)
            .arg("--model")
            .arg(&model_path)
            .arg("--host")
            .arg(&self.server_config.host)
            .arg("--port")
            .arg(self.server_config.port.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                LlmDeckError::ServerStart(format!(
                    "{}: {}",
                    self.server_config.binary.display(),
                    e
                ))
            })?;

        if let Some(status) = child.try_wait()? {
            return Err(LlmDeckError::ServerStart(format!(
                "server exited immediately ({})",
                status
            )));
        }

        let api_base = self.server_config.api_base();
        info!(model = %model_path.display(), %api_base, "Local server started");

        state.server = Some(ServerHandle {
            child,
            api_base,
            model_path,
        });
        Ok(())
    }

    #[instrument(skip(self))]
    async fn set_custom_model_path(&self, path: Option<PathBuf>) -> Result<()> {
        let mut state = self.state.lock().await;
        state.custom_model_path = path;

        // Running server still has the old model loaded
        if let Some(server) = state.server.take() {
            info!("Stopping server so the next start loads the new model");
            shutdown(server).await?;
        }
        Ok(())
    }

    async fn list_ollama_models(&self) -> Result<Vec<String>> {
        Ok(self.ollama.list_model_names().await?)
    }

    async fn is_server_running(&self) -> Result<bool> {
        let mut state = self.state.lock().await;
        let Some(server) = state.server.as_mut() else {
            return Ok(false);
        };

        match server.child.try_wait()? {
            None => Ok(true),
            Some(status) => {
                warn!(%status, model = %server.model_path.display(), "Server exited");
                state.server = None;
                Ok(false)
            }
        }
    }

    async fn probe_provider(&self) -> Result<()> {
        Ok(self.ollama.probe().await?)
    }
}

async fn shutdown(mut server: ServerHandle) -> Result<()> {
    server.child.start_kill()?;
    let status = server.child.wait().await?;
    info!(%status, "Local server stopped");
    Ok(())
}

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Stream `url` into `<dest>.part`, then move it into place
async fn download_file(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
    progress: &mpsc::Sender<u8>,
) -> Result<()> {
    let mut response = client.get(url).send().await.map_err(download_error)?;
    if !response.status().is_success() {
        return Err(LlmDeckError::Download(format!(
            "{} returned {}",
            url,
            response.status()
        )));
    }

    let total = response.content_length().unwrap_or(0);
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let part = part_path(dest);
    let mut file = tokio::fs::File::create(&part).await?;
    let mut downloaded: u64 = 0;
    let mut last_percent = None;

    while let Some(chunk) = response.chunk().await.map_err(download_error)? {
        file.write_all(&chunk).await?;
        downloaded += chunk.len() as u64;

        let percent = percent(downloaded, total);
        if last_percent != Some(percent) {
            // Nobody listening is fine
            let _ = progress.send(percent).await;
            last_percent = Some(percent);
        }
    }
    file.flush().await?;
    drop(file);

    tokio::fs::rename(&part, dest).await?;
    if last_percent != Some(100) {
        let _ = progress.send(100).await;
    }
    debug!(bytes = downloaded, "Download complete");
    Ok(())
}

fn part_path(dest: &Path) -> PathBuf {
    let mut part = dest.as_os_str().to_owned();
    part.push(".part");
    PathBuf::from(part)
}

/// Unknown sizes report 0 until the final 100
fn percent(downloaded: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    (downloaded.saturating_mul(100) / total).min(100) as u8
}

fn download_error(e: reqwest::Error) -> LlmDeckError {
    LlmDeckError::Download(e.to_string())
}

/// Non-recursive scan for `*.gguf` files, sorted by path. An unreadable
/// directory yields no models.
fn scan_gguf(dir: &Path) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!(dir = %dir.display(), "Cannot read model dir: {}", e);
            return Vec::new();
        }
    };

    let mut models: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_gguf(path))
        .collect();
    models.sort();
    models
}

pub(crate) fn is_gguf(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gguf"))
}
