use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::TypedHeader;
use axum_extra::headers::{Authorization, authorization::Bearer};
use jsonwebtoken::{DecodingKey, Validation, decode};
use tabula_db::Database;
use tabula_engine::{CallerContext, CallerKind, TableError};
use tabula_types::{Claims, UserType};

use crate::error::ApiError;
use crate::state::{AppState, run_blocking};

/// Validate the bearer token and attach a [`CallerContext`] to the request.
pub async fn require_auth(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let TypedHeader(Authorization(bearer)) =
        bearer.ok_or_else(|| TableError::Unauthorized("missing bearer token".into()))?;

    let token_data = decode::<Claims>(
        bearer.token(),
        &DecodingKey::from_secret(state.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| TableError::Unauthorized(format!("invalid token: {}", e)))?;

    let claims = token_data.claims;
    let ctx = run_blocking(&state, move |db| caller_context(db, claims)).await?;

    req.extensions_mut().insert(ctx);
    Ok(next.run(req).await)
}

fn caller_context(db: &Database, claims: Claims) -> tabula_engine::Result<CallerContext> {
    let team = db
        .get_team(claims.team_id)?
        .ok_or_else(|| TableError::Unauthorized(format!("unknown team {}", claims.team_id)))?;

    let kind = match claims.user_type {
        UserType::User => CallerKind::TeamUser {
            super_admin: claims.super_admin,
        },
        UserType::Subscriber => {
            let subscriber = db
                .get_subscriber_by_email(&team.table_prefix, &claims.sub)?
                .ok_or_else(|| TableError::Unauthorized(format!("unknown subscriber {}", claims.sub)))?;
            CallerKind::Subscriber {
                subscriber_id: subscriber.id,
            }
        }
    };

    Ok(CallerContext {
        team_id: team.id,
        team_name: team.team_name,
        table_prefix: team.table_prefix,
        user_name: claims.sub,
        kind,
    })
}
