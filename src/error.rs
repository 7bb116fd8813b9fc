// src/error.rs

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde_json::json;
use thiserror::Error;

use crate::responses;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("document encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("media not found: {0}")]
    NotFound(String),

    #[error("object storage error: {0}")]
    Storage(String),

    #[error("presign error: {0}")]
    Presign(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{}", responses::ITEM_NOT_FOUND)]
    ItemNotFound,

    #[error("{}", responses::ACTION_NOT_ALLOWED)]
    ActionNotAllowed,

    #[error("{}", responses::UNAUTHORIZED)]
    Unauthorized,

    #[error("{}", responses::NOT_ENROLLED)]
    NotEnrolled,

    #[error("{}", responses::DRIP_NOT_RELEASED)]
    DripNotReleased,

    #[error("{}", responses::SCORM_INCOMPLETE)]
    ScormIncomplete,

    #[error("{}", responses::QUIZ_NOT_PASSED)]
    QuizNotPassed,

    #[error("{}", responses::GROUP_NOT_FOUND)]
    GroupNotFound,

    #[error("{}", responses::INVALID_SIGNATURE)]
    InvalidSignature,

    #[error("{}: {}", responses::INVALID_INPUT, .0)]
    InvalidInput(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Media(#[from] MediaError),
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::Store(StoreError::Database(e))
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::ItemNotFound | AppError::GroupNotFound => StatusCode::NOT_FOUND,
            AppError::ActionNotAllowed
            | AppError::NotEnrolled
            | AppError::DripNotReleased => StatusCode::FORBIDDEN,
            AppError::Unauthorized | AppError::InvalidSignature => StatusCode::UNAUTHORIZED,
            AppError::ScormIncomplete | AppError::QuizNotPassed | AppError::InvalidInput(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Store(_) | AppError::Media(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            log::error!("request failed: {self}");
            responses::INTERNAL_ERROR.to_string()
        } else {
            self.to_string()
        };

        HttpResponse::build(status).json(json!({ "error": message }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_errors_are_not_leaked() {
        let err = AppError::Media(MediaError::Storage("bucket gone".into()));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "object storage error: bucket gone");
    }

    #[test]
    fn not_found_uses_response_table() {
        assert_eq!(AppError::ItemNotFound.to_string(), responses::ITEM_NOT_FOUND);
        assert_eq!(AppError::ItemNotFound.status_code(), StatusCode::NOT_FOUND);
    }
}
