use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::services::seats::SeatError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("Validation failed")]
    Validation(#[from] ValidationErrors),
    #[error(transparent)]
    Seats(#[from] SeatError),
    #[error("{0}")]
    EntityNotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Unauthorized")]
    Unauthorized,
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Multipart(#[from] MultipartError),
    #[error("database operation failed")]
    Database(#[from] sqlx::Error),
    #[error("password hashing failed")]
    Hashing(#[from] bcrypt::BcryptError),
    #[error("background task failed")]
    Blocking(#[from] tokio::task::JoinError),
    #[error("token signing failed")]
    TokenSigning(#[source] jsonwebtoken::errors::Error),
    #[error("file storage failed")]
    Storage(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ErrorMessage {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    status_code: u16,
    message: ErrorMessage,
    error: &'static str,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_)
            | AppError::Validation(_)
            | AppError::Seats(_)
            | AppError::Multipart(_) => StatusCode::BAD_REQUEST,
            AppError::EntityNotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::InvalidCredentials | AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Database(_)
            | AppError::Hashing(_)
            | AppError::Blocking(_)
            | AppError::TokenSigning(_)
            | AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> ErrorMessage {
        match self {
            AppError::Validation(errors) => ErrorMessage::Many(validation_messages(errors)),
            e if e.status_code().is_server_error() => {
                ErrorMessage::One("Internal server error".to_string())
            }
            e => ErrorMessage::One(e.to_string()),
        }
    }
}

/// Flattens field errors into readable messages, falling back to
/// "<field> is invalid" when a rule carries no message.
pub fn validation_messages(errors: &ValidationErrors) -> Vec<String> {
    let mut messages: Vec<String> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| match &e.message {
                Some(msg) => msg.to_string(),
                None => format!("{field} is invalid"),
            })
        })
        .collect();
    messages.sort();
    messages
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(
                error.cause_chain = ?self,
                error.message = %self,
                "Unexpected error happened"
            );
        }

        let body = ErrorBody {
            status_code: status.as_u16(),
            message: self.message(),
            error: status.canonical_reason().unwrap_or("Error"),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Probe {
        #[validate(length(min = 1, message = "title should not be empty"))]
        title: String,
        #[validate(range(min = 1))]
        capacity: i32,
    }

    #[test]
    fn seat_errors_are_bad_requests() {
        let err = AppError::from(SeatError::NotEnoughSeats { available: 1 });
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            err.to_string(),
            "Not enough seats available. Only 1 seats left."
        );
    }

    #[test]
    fn validation_messages_fall_back_to_field_name() {
        let errors = Probe { title: String::new(), capacity: 0 }
            .validate()
            .unwrap_err();
        assert_eq!(
            validation_messages(&errors),
            vec!["capacity is invalid".to_string(), "title should not be empty".to_string()]
        );
    }

    #[test]
    fn server_errors_hide_their_cause() {
        let err = AppError::Database(sqlx::Error::PoolTimedOut);
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        match err.message() {
            ErrorMessage::One(msg) => assert_eq!(msg, "Internal server error"),
            ErrorMessage::Many(_) => panic!("expected a single message"),
        }
    }

    #[test]
    fn auth_failures_map_to_401_and_403() {
        assert_eq!(AppError::InvalidCredentials.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AppError::Forbidden("nope".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(AppError::Conflict("dup".into()).status_code(), StatusCode::CONFLICT);
    }
}
