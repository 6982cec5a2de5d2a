use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::{Map, Value};
use tabula_engine::CallerContext;
use tabula_types::{ListQuery, MessageResponse};

use crate::error::ApiError;
use crate::records;
use crate::state::{AppState, run_blocking};

pub async fn list_templates(
    State(state): State<AppState>,
    Extension(ctx): Extension<CallerContext>,
) -> Result<impl IntoResponse, ApiError> {
    let templates = run_blocking(&state, move |db| records::templates(db, &ctx)).await?;
    Ok(Json(templates))
}

pub async fn list_records(
    State(state): State<AppState>,
    Path(table): Path<String>,
    Query(query): Query<ListQuery>,
    Extension(ctx): Extension<CallerContext>,
) -> Result<impl IntoResponse, ApiError> {
    let page = run_blocking(&state, move |db| records::list_records(db, &ctx, &table, &query)).await?;
    Ok(Json(page))
}

pub async fn get_record(
    State(state): State<AppState>,
    Path((table, id)): Path<(String, i64)>,
    Extension(ctx): Extension<CallerContext>,
) -> Result<impl IntoResponse, ApiError> {
    let record = run_blocking(&state, move |db| records::get_record(db, &ctx, &table, id)).await?;
    Ok(Json(record))
}

pub async fn create_record(
    State(state): State<AppState>,
    Path(table): Path<String>,
    Extension(ctx): Extension<CallerContext>,
    Json(input): Json<Map<String, Value>>,
) -> Result<impl IntoResponse, ApiError> {
    let record = run_blocking(&state, move |db| records::create_record(db, &ctx, &table, &input)).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn update_record(
    State(state): State<AppState>,
    Path((table, id)): Path<(String, i64)>,
    Extension(ctx): Extension<CallerContext>,
    Json(input): Json<Map<String, Value>>,
) -> Result<impl IntoResponse, ApiError> {
    let record =
        run_blocking(&state, move |db| records::update_record(db, &ctx, &table, id, &input)).await?;
    Ok(Json(record))
}

pub async fn delete_record(
    State(state): State<AppState>,
    Path((table, id)): Path<(String, i64)>,
    Extension(ctx): Extension<CallerContext>,
) -> Result<impl IntoResponse, ApiError> {
    run_blocking(&state, move |db| records::delete_record(db, &ctx, &table, id)).await?;
    Ok(Json(MessageResponse::new(format!("Record {} deleted", id))))
}
