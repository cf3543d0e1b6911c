use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Failures of the classification pipeline.
///
/// `Download` and `Load` happen once at startup and leave the app unable to
/// classify. `Decode` and `Inference` only affect the upload that caused them.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Failed to download model from {url}: {reason}")]
    Download { url: String, reason: String },

    #[error("Failed to load model {}: {reason}", path.display())]
    Load { path: PathBuf, reason: String },

    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Download { .. } => "download",
            PipelineError::Load { .. } => "load",
            PipelineError::Decode(_) => "decode",
            PipelineError::Inference(_) => "inference",
            PipelineError::Io(_) => "io",
        }
    }

    /// Startup failures cannot be recovered from without restarting the app.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PipelineError::Download { .. } | PipelineError::Load { .. }
        )
    }
}

impl From<image::ImageError> for PipelineError {
    fn from(err: image::ImageError) -> Self {
        PipelineError::Decode(err.to_string())
    }
}

/// Error shape returned to the web view.
#[derive(Debug, Serialize)]
pub struct AppError {
    pub kind: String,
    pub message: String,
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        AppError {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError {
            kind: "internal".to_string(),
            message: msg,
        }
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError {
            kind: "internal".to_string(),
            message: msg.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_keeps_kind_and_message() {
        let err: AppError = PipelineError::Decode("not a png".into()).into();
        assert_eq!(err.kind, "decode");
        assert_eq!(err.message, "Failed to decode image: not a png");
    }

    #[test]
    fn test_only_startup_errors_are_fatal() {
        let download = PipelineError::Download {
            url: "http://example.invalid/model.onnx".into(),
            reason: "HTTP 404".into(),
        };
        let load = PipelineError::Load {
            path: PathBuf::from("model.onnx"),
            reason: "corrupt".into(),
        };
        assert!(download.is_fatal());
        assert!(load.is_fatal());
        assert!(!PipelineError::Decode("x".into()).is_fatal());
        assert!(!PipelineError::Inference("x".into()).is_fatal());
    }
}
