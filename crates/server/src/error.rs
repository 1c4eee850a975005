use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use deployment::DeploymentError;
use services::services::{case::CaseError, lookup::LookupError, user::UserError};
use thiserror::Error;
use utils::response::ApiResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Case(#[from] CaseError),
    #[error(transparent)]
    Lookup(#[from] LookupError),
    #[error(transparent)]
    User(#[from] UserError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Deployment(#[from] DeploymentError),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    BadRequest(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Case(err) => match err {
                CaseError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
                CaseError::NotFound | CaseError::CommentNotFound => StatusCode::NOT_FOUND,
                CaseError::Validation(_) => StatusCode::BAD_REQUEST,
                CaseError::InvalidTransition { .. } | CaseError::Conflict(_) => {
                    StatusCode::CONFLICT
                }
                CaseError::Forbidden(_) => StatusCode::FORBIDDEN,
            },
            ApiError::Lookup(err) => match err {
                LookupError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
                LookupError::NotFound(_) | LookupError::Empty(_) => StatusCode::NOT_FOUND,
                LookupError::Validation(_) => StatusCode::BAD_REQUEST,
                LookupError::Conflict(_) => StatusCode::CONFLICT,
            },
            ApiError::User(err) => match err {
                UserError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
                UserError::NotFound => StatusCode::NOT_FOUND,
                UserError::Validation(_) => StatusCode::BAD_REQUEST,
                UserError::EmailTaken(_) => StatusCode::CONFLICT,
            },
            ApiError::Database(sqlx::Error::RowNotFound) => StatusCode::NOT_FOUND,
            ApiError::Database(_) | ApiError::Deployment(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status_code = self.status_code();

        let message = if status_code == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "Request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let response = ApiResponse::<()>::error(&message);
        (status_code, Json(response)).into_response()
    }
}
