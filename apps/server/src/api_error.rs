use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

use upwatch_service::monitoring::scheduler::SchedulerError;

/// Errors surfaced to API clients as JSON bodies
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("Resource not found")]
    NotFound,
    #[error("{0}")]
    Scheduler(#[from] SchedulerError),
    #[error("{0:#}")]
    Internal(#[from] anyhow::Error),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Scheduler(
                SchedulerError::AlreadyRunning | SchedulerError::NotRunning,
            ) => StatusCode::CONFLICT,
            ApiError::Scheduler(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "error": self.to_string() }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_misuse_maps_to_conflict() {
        assert_eq!(
            ApiError::Scheduler(SchedulerError::AlreadyRunning).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::Scheduler(SchedulerError::NotRunning).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::Scheduler(SchedulerError::Registry(anyhow::anyhow!("gone"))).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn error_bodies_carry_the_message() {
        let response = ApiError::Validation("Invalid URL: empty host".to_string()).error_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
