use std::env;
use std::path::{Path, PathBuf};

pub const MODEL_FILE_NAME: &str = "model_binary.onnx";

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }

    pub fn from_env() -> Self {
        match env::var("ENVIRONMENT")
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
            .as_str()
        {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: Environment,
    /// Where to fetch the ONNX artifact from. Only needed when it is not cached yet.
    pub model_url: Option<String>,
    /// Overrides the default artifact location under the app data directory.
    pub model_path: Option<PathBuf>,
    pub onnx_threads: usize,
}

impl AppConfig {
    /// Load configuration from environment variables with sensible defaults
    pub fn from_env() -> Self {
        let environment = Environment::from_env();

        let model_url = env::var("RETINA_MODEL_URL")
            .ok()
            .filter(|s| !s.trim().is_empty());

        let model_path = env::var("RETINA_MODEL_PATH")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        let onnx_threads = env::var("RETINA_ONNX_THREADS")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|&n: &usize| n > 0)
            .unwrap_or(1);

        Self {
            environment,
            model_url,
            model_path,
            onnx_threads,
        }
    }

    /// Where the artifact is cached, given the app's data directory.
    pub fn resolve_model_path(&self, app_data_dir: &Path) -> PathBuf {
        self.model_path
            .clone()
            .unwrap_or_else(|| app_data_dir.join("models").join(MODEL_FILE_NAME))
    }
}
