use axum::{
    extract::{Multipart, State},
    routing::post,
    Router,
    Json,
    http::Method,
};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use crate::{
    AppState,
    error::AppError,
    routes::upload::read_upload,
    services::summary::{self, Summary},
};
use tower_http::cors::{CorsLayer, Any};

pub fn routes() -> Router<Arc<AppState>> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .max_age(std::time::Duration::from_secs(3600));

    Router::new()
        .route("/check/", post(check_data))
        .route("/check", post(check_data))
        .layer(cors)
}

/// Summary returned by the check endpoint. Column maps keep column order.
#[derive(Debug, Serialize, Clone)]
pub struct CheckResponse {
    rows: usize,
    columns: usize,
    missing_values: Map<String, Value>,
    duplicates: usize,
    data_types: Map<String, Value>,
}

impl From<&Summary> for CheckResponse {
    fn from(summary: &Summary) -> Self {
        Self {
            rows: summary.row_count,
            columns: summary.column_count,
            missing_values: summary.columns.iter()
                .map(|c| (c.name.clone(), Value::from(c.missing_count)))
                .collect(),
            duplicates: summary.duplicate_count,
            data_types: summary.columns.iter()
                .map(|c| (c.name.clone(), Value::from(c.data_type.as_str())))
                .collect(),
        }
    }
}

#[axum::debug_handler]
async fn check_data(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<CheckResponse>, AppError> {
    let start = std::time::Instant::now();
    let upload = read_upload(multipart, state.config.max_file_size).await?;
    tracing::info!(
        "Checking {} ({} file, {}KB)",
        upload.display_name(),
        upload.format,
        upload.bytes.len() / 1024
    );

    let dataset = upload.into_dataset(state.config.max_file_size)?;
    let summary = summary::summarize(&dataset);

    tracing::info!(
        "Check completed in {:?}: {} rows, {} columns, {} duplicates",
        start.elapsed(),
        summary.row_count,
        summary.column_count,
        summary.duplicate_count
    );

    Ok(Json(CheckResponse::from(&summary)))
}
