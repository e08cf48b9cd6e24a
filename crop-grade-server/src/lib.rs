use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use crop_grade::{GradeReport, GradingService, ModelResolver, TempUpload};
use log::{debug, error, info};
use serde_json::{json, Value};

pub mod config;
pub mod error;

pub use config::ServerConfig;
use error::ApiError;

/// Name of the multipart field carrying the image
pub const UPLOAD_FIELD: &str = "file";

pub struct AppState {
    pub service: Arc<GradingService>,

    /// Where uploads are staged while being graded
    pub temp_dir: PathBuf,
}

pub fn app(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/predict", post(predict))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(Arc::new(state))
}

async fn predict(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<GradeReport>, ApiError> {
    let mut multipart = multipart.map_err(|rejection| {
        debug!("Rejected upload: {}", rejection);
        ApiError::NoFile
    })?;

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadUpload(e.to_string()))?
    {
        if field.name() == Some(UPLOAD_FIELD) {
            let file_name = field.file_name().map(str::to_owned);
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadUpload(e.to_string()))?;
            upload = Some((file_name, bytes));
            break;
        }
    }

    let (file_name, bytes) = upload.ok_or(ApiError::NoFile)?;
    debug!("Received {:?} ({} bytes)", file_name, bytes.len());

    let service = Arc::clone(&state.service);
    let temp_dir = state.temp_dir.clone();

    // the staged file is dropped, and deleted, before the closure returns
    let report = tokio::task::spawn_blocking(move || -> crop_grade::Result<GradeReport> {
        let staged = TempUpload::stage(&temp_dir, file_name.as_deref(), &bytes)?;
        Ok(service.grade_file(staged.path()))
    })
    .await
    .map_err(|e| ApiError::Internal(format!("grading task failed: {}", e)))?
    .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(report))
}

async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let model = state.service.model();
    let mode = if model.is_mock() { "mock" } else { "model" };

    Json(json!({
        "status": "ok",
        "mode": mode,
        "loader": model.loader(),
    }))
}

pub async fn run(config: ServerConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    std::fs::create_dir_all(&config.temp_dir)?;

    info!("Loading AI model from {}", config.model.display());
    let model_path = config.model.clone();
    let model = tokio::task::spawn_blocking(move || ModelResolver::standard().resolve(&model_path)).await?;
    info!("Model state: {:?}", model);

    let state = AppState {
        service: Arc::new(GradingService::new(model)),
        temp_dir: config.temp_dir.clone(),
    };

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app(state, config.max_upload_bytes))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Could not listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
