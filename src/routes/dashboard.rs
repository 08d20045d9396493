use axum::{
    extract::{Multipart, Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::post,
    Router,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use crate::{
    AppState,
    error::AppError,
    routes::upload::read_upload,
    services::{
        dashboard::{self, ColumnStats, DuplicateReport, MissingReport, Preview},
        dataset::Dataset,
        exporter::{self, ExportKind},
        summary,
    },
};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/dashboard/preview", post(preview))
        .route("/dashboard/missing", post(missing_values))
        .route("/dashboard/duplicates", post(duplicates))
        .route("/dashboard/columns", post(column_stats))
        .route("/dashboard/export/:kind", post(export))
}

#[derive(Debug, Deserialize)]
pub struct PreviewParams {
    rows: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct ColumnParams {
    column: Option<String>,
}

async fn load_dataset(state: &AppState, multipart: Multipart) -> Result<Dataset, AppError> {
    let upload = read_upload(multipart, state.config.max_file_size).await?;
    tracing::info!("Loaded upload {} for the dashboard", upload.display_name());
    upload.into_dataset(state.config.max_file_size)
}

async fn preview(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PreviewParams>,
    multipart: Multipart,
) -> Result<Json<Preview>, AppError> {
    let dataset = load_dataset(&state, multipart).await?;
    Ok(Json(dashboard::preview(&dataset, params.rows)))
}

async fn missing_values(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<MissingReport>, AppError> {
    let dataset = load_dataset(&state, multipart).await?;
    let report = dashboard::missing_report(&summary::summarize(&dataset));
    if !report.high_missing_columns.is_empty() {
        tracing::info!("Columns with >50% missing: {}", report.high_missing_columns.join(", "));
    }
    Ok(Json(report))
}

async fn duplicates(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<DuplicateReport>, AppError> {
    let dataset = load_dataset(&state, multipart).await?;
    Ok(Json(dashboard::duplicate_report(&dataset)))
}

async fn column_stats(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ColumnParams>,
    multipart: Multipart,
) -> Result<Json<ColumnStats>, AppError> {
    let dataset = load_dataset(&state, multipart).await?;
    Ok(Json(dashboard::column_stats(&dataset, params.column.as_deref())?))
}

async fn export(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let kind = ExportKind::from_name(&kind).ok_or_else(|| {
        AppError::InvalidInput(format!("Unknown export '{}', expected csv, json or summary", kind))
    })?;

    let dataset = load_dataset(&state, multipart).await?;
    let file = exporter::export(&dataset, kind)?;
    tracing::info!("Exporting {} ({} bytes)", file.file_name, file.bytes.len());

    Ok((
        [
            (header::CONTENT_TYPE, file.content_type.to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", file.file_name)),
        ],
        file.bytes,
    )
        .into_response())
}
