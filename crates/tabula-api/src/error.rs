use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tabula_engine::TableError;
use tabula_types::MessageResponse;
use tracing::{error, warn};

/// HTTP face of [`TableError`]. Every handler returns this.
#[derive(Debug)]
pub struct ApiError(pub TableError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            TableError::InvalidTable(_) | TableError::BadInput(_) => StatusCode::BAD_REQUEST,
            TableError::TableNotFound(_) | TableError::RecordNotFound(_) => StatusCode::NOT_FOUND,
            TableError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            TableError::Conflict(_) | TableError::ConcurrencyConflict(_) => StatusCode::CONFLICT,
            TableError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<TableError> for ApiError {
    fn from(err: TableError) -> Self {
        Self(err)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self(TableError::Storage(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self.0 {
            TableError::Storage(e) => {
                error!("storage error: {:#}", e);
                "Internal server error".to_string()
            }
            other => {
                warn!("request rejected ({}): {}", status, other);
                other.to_string()
            }
        };
        (status, Json(MessageResponse::new(message))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        let status = |e: TableError| ApiError::from(e).status();
        assert_eq!(status(TableError::InvalidTable("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status(TableError::BadInput("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status(TableError::TableNotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(status(TableError::RecordNotFound(1)), StatusCode::NOT_FOUND);
        assert_eq!(status(TableError::Unauthorized("x".into())), StatusCode::UNAUTHORIZED);
        assert_eq!(status(TableError::Conflict("x".into())), StatusCode::CONFLICT);
        assert_eq!(status(TableError::ConcurrencyConflict(1)), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::from(anyhow::anyhow!("disk full")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
