use crate::error::{AppError, PipelineError};
use crate::models::classify_types::{ModelStatus, ResultView};
use crate::services::classifier::inference;
use crate::services::classifier::model_manager::ModelManager;
use crate::services::{preview_service, report_service};
use tauri::ipc::{InvokeBody, Request};
use tauri::State;

#[tauri::command]
pub async fn get_model_status(model_manager: State<'_, ModelManager>) -> Result<ModelStatus, AppError> {
    Ok(model_manager.status().await)
}

/// Classify one uploaded image. The request body is the raw file bytes.
#[tauri::command]
pub async fn classify_upload(
    request: Request<'_>,
    model_manager: State<'_, ModelManager>,
) -> Result<ResultView, AppError> {
    let bytes = match request.body() {
        InvokeBody::Raw(bytes) => bytes.clone(),
        InvokeBody::Json(_) => return Err("Expected the image file as a raw request body".into()),
    };

    let Some(model) = model_manager.get_model() else {
        let message = model_manager
            .get_error()
            .await
            .unwrap_or_else(|| "Model is not ready yet".to_string());
        return Err(AppError {
            kind: "not_ready".to_string(),
            message,
        });
    };

    let upload_size = bytes.len();
    let result = tokio::task::spawn_blocking(move || -> Result<ResultView, PipelineError> {
        let (diagnosis, rgb) = inference::classify_upload_with_model(model.as_ref(), &bytes)?;

        let preview = match preview_service::generate_preview(&rgb) {
            Ok(uri) => Some(uri),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to build preview");
                None
            }
        };

        Ok(report_service::render(&diagnosis, preview))
    })
    .await
    .map_err(|e| AppError::from(format!("Classification task failed: {}", e)))?;

    match result {
        Ok(view) => {
            tracing::info!(
                upload_size,
                label = %view.label,
                score = %view.score_text,
                "Classified upload"
            );
            Ok(view)
        }
        Err(e) => {
            tracing::warn!(upload_size, error = %e, "Failed to classify upload");
            Err(e.into())
        }
    }
}
