use axum::{
    Json, Router, middleware,
    response::IntoResponse,
    routing::get,
};

use crate::middleware::require_auth;
use crate::state::AppState;
use crate::{data, forms, readers, tables};

async fn ping() -> impl IntoResponse {
    Json("ok")
}

/// Every route of the service. Layers such as CORS and tracing are added by the binary.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/ping", get(ping))
        .route("/readers/{team_id}/{table}", get(readers::list_records))
        .route("/readers/{team_id}/{table}/{id}", get(readers::get_record))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/data", get(data::list_templates))
        .route("/data/{table}", get(data::list_records).post(data::create_record))
        .route(
            "/data/{table}/{id}",
            get(data::get_record)
                .put(data::update_record)
                .delete(data::delete_record),
        )
        .route("/forms/{table}", get(forms::list_forms).post(forms::submit_form))
        .route("/forms/{table}/{id}", get(forms::get_form))
        .route("/tables", get(tables::list_tables).post(tables::create_table))
        .route(
            "/tables/{id}",
            get(tables::get_table)
                .put(tables::update_table)
                .delete(tables::delete_table),
        )
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    Router::new().merge(public_routes).merge(protected_routes)
}
