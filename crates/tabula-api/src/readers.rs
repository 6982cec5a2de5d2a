//! Unauthenticated read access to tables published at privacy level 1 or above.

use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use tabula_types::ListQuery;

use crate::error::ApiError;
use crate::records;
use crate::state::{AppState, run_blocking};

pub async fn list_records(
    State(state): State<AppState>,
    Path((team_id, table)): Path<(i64, String)>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = run_blocking(&state, move |db| records::read_records(db, team_id, &table, &query)).await?;
    Ok(Json(page))
}

pub async fn get_record(
    State(state): State<AppState>,
    Path((team_id, table, id)): Path<(i64, String, i64)>,
) -> Result<impl IntoResponse, ApiError> {
    let record = run_blocking(&state, move |db| records::read_record(db, team_id, &table, id)).await?;
    Ok(Json(record))
}
