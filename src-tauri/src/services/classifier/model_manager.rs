use crate::config::AppConfig;
use crate::error::PipelineError;
use crate::models::classify_types::{DownloadProgress, ModelStatus};
use crate::services::classifier::inference::{OnnxModel, Scorer};
use futures::StreamExt;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, OnceCell};

/// Turns the artifact on disk into a [`Scorer`].
pub trait ModelLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<Arc<dyn Scorer>, PipelineError>;
}

/// Builds an ONNX Runtime session from the artifact.
pub struct OnnxLoader {
    onnx_threads: usize,
}

impl OnnxLoader {
    pub fn new(onnx_threads: usize) -> Self {
        Self {
            onnx_threads: onnx_threads.max(1),
        }
    }
}

impl Default for OnnxLoader {
    fn default() -> Self {
        Self::new(1)
    }
}

impl ModelLoader for OnnxLoader {
    fn load(&self, path: &Path) -> Result<Arc<dyn Scorer>, PipelineError> {
        let load_err = |reason: String| PipelineError::Load {
            path: path.to_path_buf(),
            reason,
        };

        if !path.is_file() {
            return Err(load_err("Model file not found".to_string()));
        }

        let _ = ort::init().with_name("retina-check").commit();

        let session = Session::builder()
            .map_err(|e| load_err(format!("Failed to create session builder: {}", e)))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| load_err(format!("Failed to set optimization level: {}", e)))?
            .with_intra_threads(self.onnx_threads)
            .map_err(|e| load_err(format!("Failed to set intra threads: {}", e)))?
            .commit_from_file(path)
            .map_err(|e| load_err(format!("Failed to load ONNX model: {}", e)))?;

        let model = OnnxModel::new(session).map_err(|e| load_err(e.to_string()))?;

        tracing::info!(
            path = %path.display(),
            input = %model.input_name(),
            threads = self.onnx_threads,
            "Model loaded"
        );

        Ok(Arc::new(model))
    }
}

/// Owns the model artifact and the process-wide loaded model.
///
/// Built once at startup and shared by handle. The artifact is fetched at most
/// once and the model is constructed at most once; later calls reuse both.
#[derive(Clone)]
pub struct ModelManager {
    pub model_url: Option<String>,
    pub model_path: PathBuf,
    client: reqwest::Client,
    loader: Arc<dyn ModelLoader>,
    model: Arc<OnceCell<Arc<dyn Scorer>>>,
    loading: Arc<Mutex<bool>>,
    error: Arc<Mutex<Option<String>>>,
}

impl ModelManager {
    pub fn new(
        model_url: Option<String>,
        model_path: impl Into<PathBuf>,
        loader: Arc<dyn ModelLoader>,
    ) -> Self {
        Self {
            model_url,
            model_path: model_path.into(),
            client: reqwest::Client::new(),
            loader,
            model: Arc::new(OnceCell::new()),
            loading: Arc::new(Mutex::new(false)),
            error: Arc::new(Mutex::new(None)),
        }
    }

    pub fn from_config(config: &AppConfig, app_data_dir: &Path) -> Self {
        Self::new(
            config.model_url.clone(),
            config.resolve_model_path(app_data_dir),
            Arc::new(OnnxLoader::new(config.onnx_threads)),
        )
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn is_downloaded(&self) -> bool {
        self.model_path.is_file()
    }

    pub fn is_ready(&self) -> bool {
        self.model.initialized()
    }

    pub async fn is_loading(&self) -> bool {
        *self.loading.lock().await
    }

    pub async fn get_error(&self) -> Option<String> {
        self.error.lock().await.clone()
    }

    pub async fn status(&self) -> ModelStatus {
        ModelStatus {
            downloaded: self.is_downloaded(),
            loading: self.is_loading().await,
            ready: self.is_ready(),
            error: self.get_error().await,
        }
    }

    /// The loaded model, if startup finished.
    pub fn get_model(&self) -> Option<Arc<dyn Scorer>> {
        self.model.get().cloned()
    }

    /// Make sure the artifact exists locally, downloading it if it does not.
    pub async fn provision<F>(&self, on_progress: F) -> Result<(), PipelineError>
    where
        F: Fn(DownloadProgress) + Send + Sync,
    {
        if self.is_downloaded() {
            tracing::debug!(path = %self.model_path.display(), "Model already present, skipping download");
            return Ok(());
        }

        let result = self.fetch_artifact(&on_progress).await;
        if let Err(ref e) = result {
            tracing::error!(
                url = self.model_url.as_deref().unwrap_or("<unset>"),
                error = %e,
                "Model download failed"
            );
            *self.error.lock().await = Some(e.to_string());
        }
        result
    }

    async fn fetch_artifact<F>(&self, on_progress: &F) -> Result<(), PipelineError>
    where
        F: Fn(DownloadProgress) + Send + Sync,
    {
        let url = self.model_url.as_deref().ok_or_else(|| PipelineError::Download {
            url: "(RETINA_MODEL_URL not set)".to_string(),
            reason: format!("no model cached at {}", self.model_path.display()),
        })?;

        if let Some(dir) = self.model_path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }

        tracing::info!(
            url = %url,
            path = %self.model_path.display(),
            "Downloading model"
        );
        download_file(&self.client, url, &self.model_path, on_progress).await?;
        tracing::info!(path = %self.model_path.display(), "Model downloaded");
        Ok(())
    }

    /// Load the model on first call; every later call returns the same handle.
    ///
    /// A failed load is not cached, so a later call tries again.
    pub async fn load(&self) -> Result<Arc<dyn Scorer>, PipelineError> {
        let model = self
            .model
            .get_or_try_init(|| async {
                *self.loading.lock().await = true;
                *self.error.lock().await = None;

                let result = self.do_load_model().await;

                *self.loading.lock().await = false;
                if let Err(ref e) = result {
                    tracing::error!(path = %self.model_path.display(), error = %e, "Model load failed");
                    *self.error.lock().await = Some(e.to_string());
                }
                result
            })
            .await?;

        Ok(model.clone())
    }

    async fn do_load_model(&self) -> Result<Arc<dyn Scorer>, PipelineError> {
        let loader = self.loader.clone();
        let path = self.model_path.clone();

        tokio::task::spawn_blocking(move || loader.load(&path))
            .await
            .map_err(|e| PipelineError::Load {
                path: self.model_path.clone(),
                reason: format!("Model loading task failed: {}", e),
            })?
    }

    /// Startup sequence: provision, then load.
    pub async fn ensure_ready<F>(&self, on_progress: F) -> Result<Arc<dyn Scorer>, PipelineError>
    where
        F: Fn(DownloadProgress) + Send + Sync,
    {
        self.provision(on_progress).await?;
        self.load().await
    }
}

/// `model.onnx` downloads into `model.onnx.part` until complete.
fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}

/// ONNX files are protobuf and never start with a markup tag.
fn looks_like_html(head: &[u8]) -> bool {
    head.iter()
        .find(|b| !b.is_ascii_whitespace())
        .is_some_and(|&b| b == b'<')
}

async fn download_file<F>(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
    on_progress: &F,
) -> Result<(), PipelineError>
where
    F: Fn(DownloadProgress) + Send + Sync,
{
    let part = partial_path(dest);

    match stream_to_file(client, url, &part, on_progress).await {
        Ok(()) => {
            tokio::fs::rename(&part, dest).await?;
            Ok(())
        }
        Err(e) => {
            let _ = tokio::fs::remove_file(&part).await;
            Err(e)
        }
    }
}

async fn stream_to_file<F>(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
    on_progress: &F,
) -> Result<(), PipelineError>
where
    F: Fn(DownloadProgress) + Send + Sync,
{
    let download_err = |reason: String| PipelineError::Download {
        url: url.to_string(),
        reason,
    };

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| download_err(e.to_string()))?;

    if !response.status().is_success() {
        return Err(download_err(format!("HTTP {}", response.status())));
    }

    // File hosts answer with an HTML page (login, quota, virus scan) instead of the file.
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();
    if content_type.starts_with("text/html") {
        return Err(download_err(
            "Server returned an HTML page instead of the model file".to_string(),
        ));
    }

    let total = response.content_length().unwrap_or(0);
    let mut downloaded: u64 = 0;
    let mut last_emit = 0;

    let mut file = tokio::fs::File::create(dest).await?;
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| download_err(e.to_string()))?;
        if downloaded == 0 && looks_like_html(&chunk) {
            return Err(download_err(
                "Server returned an HTML page instead of the model file".to_string(),
            ));
        }
        downloaded += chunk.len() as u64;
        file.write_all(&chunk).await?;

        if total > 0 {
            let percent = (downloaded * 100) / total;
            // Emit every 1% or so to reduce traffic
            if percent > last_emit {
                on_progress(DownloadProgress {
                    downloaded,
                    total,
                    percent,
                });
                last_emit = percent;
            }
        }
    }
    file.flush().await?;

    if last_emit < 100 {
        on_progress(DownloadProgress {
            downloaded,
            total,
            percent: 100,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_path() {
        assert_eq!(
            partial_path(Path::new("/data/models/model_binary.onnx")),
            PathBuf::from("/data/models/model_binary.onnx.part")
        );
    }

    #[test]
    fn test_looks_like_html() {
        assert!(looks_like_html(b"<!DOCTYPE html><html>"));
        assert!(looks_like_html(b"\n  <html>Google Drive can't scan this file</html>"));
        assert!(!looks_like_html(b"\x08\x07\x12\x07pytorch"));
        assert!(!looks_like_html(b""));
    }

    #[test]
    fn test_onnx_loader_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.onnx");
        let err = OnnxLoader::default().load(&path).err().unwrap();
        assert!(matches!(err, PipelineError::Load { .. }), "{err:?}");
    }

    #[test]
    fn test_onnx_loader_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corrupt.onnx");
        std::fs::write(&path, b"<html>quota exceeded</html>").unwrap();
        let err = OnnxLoader::default().load(&path).err().unwrap();
        assert!(matches!(err, PipelineError::Load { .. }), "{err:?}");
    }
}
