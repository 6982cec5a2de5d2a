//! Subscriber submissions. Each subscriber only ever sees their own rows.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::{Map, Value};
use tabula_engine::CallerContext;
use tabula_types::ListQuery;

use crate::error::ApiError;
use crate::records;
use crate::state::{AppState, run_blocking};

pub async fn submit_form(
    State(state): State<AppState>,
    Path(table): Path<String>,
    Extension(ctx): Extension<CallerContext>,
    Json(input): Json<Map<String, Value>>,
) -> Result<impl IntoResponse, ApiError> {
    let record = run_blocking(&state, move |db| records::submit_form(db, &ctx, &table, &input)).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn list_forms(
    State(state): State<AppState>,
    Path(table): Path<String>,
    Query(query): Query<ListQuery>,
    Extension(ctx): Extension<CallerContext>,
) -> Result<impl IntoResponse, ApiError> {
    let page = run_blocking(&state, move |db| records::list_forms(db, &ctx, &table, &query)).await?;
    Ok(Json(page))
}

pub async fn get_form(
    State(state): State<AppState>,
    Path((table, id)): Path<(String, i64)>,
    Extension(ctx): Extension<CallerContext>,
) -> Result<impl IntoResponse, ApiError> {
    let record = run_blocking(&state, move |db| records::get_form(db, &ctx, &table, id)).await?;
    Ok(Json(record))
}
