use axum::{Json, http::StatusCode, response::{IntoResponse, Response}};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::models::{Course, hhmm};
use crate::schedule::ScheduleError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error("Not found")]
    NotFound,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Course conflicts with {} existing course(s)", .0.len())]
    Conflict(Vec<Course>),
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<Course>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut conflicts = Vec::new();
        let (status, error_message) = match self {
            AppError::NotFound => (StatusCode::NOT_FOUND, "Not Found".to_string()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Schedule(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            AppError::Conflict(clashes) => {
                let message = format!(
                    "Course conflicts with: {}",
                    clashes
                        .iter()
                        .map(|c| {
                            format!(
                                "{} ({} {}-{})",
                                c.name,
                                c.weeks,
                                hhmm::format(&c.start_time),
                                hhmm::format(&c.end_time)
                            )
                        })
                        .collect::<Vec<_>>()
                        .join(", ")
                );
                conflicts = clashes;
                (StatusCode::CONFLICT, message)
            }
            AppError::Database(e) => {
                error!("database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error occurred".to_string(),
                )
            }
            AppError::Io(e) => {
                error!("io error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            error: status.to_string(),
            message: error_message,
            conflicts,
        });

        (status, body).into_response()
    }
}
