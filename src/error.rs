use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use log::error;
use thiserror::Error;

use crate::{models::MessageResponse, store::StoreError};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Token is missing")]
    AuthMissing,

    #[error("Token is invalid")]
    AuthInvalid,

    #[error("Email and password required")]
    MissingCredentials,

    #[error("Invalid email or password")]
    UnknownAccount,

    #[error("Invalid email or password")]
    InvalidCredential,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("Email already registered")]
    DuplicateEmail,

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Persistence(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Prefixes a storage failure with the action that was being attempted.
    pub fn during(self, action: &str) -> Self {
        match self {
            ApiError::Persistence(detail) => ApiError::Persistence(format!("Error {action}: {detail}")),
            other => other,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            StoreError::InUse(message) => ApiError::Conflict(message),
            StoreError::InvalidReference(message) => ApiError::Validation(message),
            StoreError::DuplicateEmail => ApiError::DuplicateEmail,
            StoreError::NoStages => ApiError::Validation(err.to_string()),
            StoreError::Database(err) => ApiError::Persistence(err.to_string()),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::AuthMissing
            | ApiError::AuthInvalid
            | ApiError::MissingCredentials
            | ApiError::UnknownAccount
            | ApiError::InvalidCredential => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Validation(_) | ApiError::DuplicateEmail => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Persistence(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            error!("{self}");
        }

        HttpResponse::build(status).json(MessageResponse::new(self.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_http_statuses() {
        let not_found = ApiError::from(StoreError::NotFound {
            entity: "Equipment",
            id: 4,
        });
        assert_eq!(not_found.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(not_found.to_string(), "Equipment 4 was not found");

        let in_use = ApiError::from(StoreError::InUse("Team 2 is still assigned".to_string()));
        assert_eq!(in_use.status_code(), StatusCode::CONFLICT);

        let duplicate = ApiError::from(StoreError::DuplicateEmail);
        assert_eq!(duplicate.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn persistence_errors_carry_the_attempted_action() {
        let err = ApiError::from(StoreError::Database(sqlx::Error::PoolTimedOut))
            .during("creating equipment");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().starts_with("Error creating equipment: "));

        let untouched = ApiError::NotFound("Team 1 was not found".to_string()).during("deleting team");
        assert_eq!(untouched.to_string(), "Team 1 was not found");
    }
}
