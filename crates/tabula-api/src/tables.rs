use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use tabula_engine::CallerContext;
use tabula_engine::paging::PageRequest;
use tabula_types::{CreateTableRequest, MessageResponse, UpdateTableRequest};

use crate::catalog;
use crate::error::ApiError;
use crate::state::{AppState, run_blocking};

pub async fn list_tables(
    State(state): State<AppState>,
    Query(request): Query<PageRequest>,
    Extension(ctx): Extension<CallerContext>,
) -> Result<impl IntoResponse, ApiError> {
    let page = run_blocking(&state, move |db| catalog::list_tables(db, &ctx, &request)).await?;
    Ok(Json(page))
}

pub async fn get_table(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(ctx): Extension<CallerContext>,
) -> Result<impl IntoResponse, ApiError> {
    let table = run_blocking(&state, move |db| catalog::get_table(db, &ctx, id)).await?;
    Ok(Json(table))
}

pub async fn create_table(
    State(state): State<AppState>,
    Extension(ctx): Extension<CallerContext>,
    Json(req): Json<CreateTableRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let table = run_blocking(&state, move |db| catalog::create_table(db, &ctx, &req)).await?;
    Ok((StatusCode::CREATED, Json(table)))
}

pub async fn update_table(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(ctx): Extension<CallerContext>,
    Json(req): Json<UpdateTableRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let table = run_blocking(&state, move |db| catalog::update_table(db, &ctx, id, &req)).await?;
    Ok(Json(table))
}

pub async fn delete_table(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(ctx): Extension<CallerContext>,
) -> Result<impl IntoResponse, ApiError> {
    run_blocking(&state, move |db| catalog::delete_table(db, &ctx, id)).await?;
    Ok(Json(MessageResponse::new(format!("Table {} deleted", id))))
}
