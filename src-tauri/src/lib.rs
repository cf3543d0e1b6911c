#[cfg(feature = "desktop")]
mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod services;

#[cfg(feature = "desktop")]
pub use desktop::run;

#[cfg(feature = "desktop")]
mod desktop {
    use crate::commands;
    use crate::config::AppConfig;
    use crate::logging::setup_logging;
    use crate::models::classify_types::DownloadProgress;
    use crate::services::classifier::model_manager::ModelManager;
    use tauri::{Emitter, Manager};

    #[cfg_attr(mobile, tauri::mobile_entry_point)]
    pub fn run() {
        let config = AppConfig::from_env();
        setup_logging(&config.environment);
        tracing::info!(environment = config.environment.as_str(), "Starting retina-check");

        tauri::Builder::default()
            .setup(move |app| {
                let app_data_dir = app.path().app_data_dir()?;
                std::fs::create_dir_all(&app_data_dir)?;

                let model_manager = ModelManager::from_config(&config, &app_data_dir);
                app.manage(model_manager.clone());

                // Provision and load once, before any upload is accepted
                let app_handle = app.handle().clone();
                tauri::async_runtime::spawn(async move {
                    let _ = app_handle.emit(
                        "model-status",
                        serde_json::json!({ "status": "preparing" }),
                    );

                    let progress_handle = app_handle.clone();
                    let result = model_manager
                        .ensure_ready(move |progress: DownloadProgress| {
                            let _ = progress_handle.emit("download-progress", progress);
                        })
                        .await;

                    match result {
                        Ok(_) => {
                            let _ = app_handle.emit(
                                "model-status",
                                serde_json::json!({ "status": "ready" }),
                            );
                        }
                        Err(e) => {
                            // Download and load failures need a restart; anything else may clear up.
                            let status = if e.is_fatal() { "failed" } else { "error" };
                            tracing::error!(error = %e, kind = e.kind(), "Model unavailable, classification disabled");
                            let _ = app_handle.emit(
                                "model-status",
                                serde_json::json!({ "status": status, "error": e.to_string() }),
                            );
                        }
                    }
                });

                Ok(())
            })
            .invoke_handler(tauri::generate_handler![
                commands::classifier::get_model_status,
                commands::classifier::classify_upload,
            ])
            .run(tauri::generate_context!())
            .expect("error while running tauri application");
    }
}
