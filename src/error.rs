use crate::middleware::error_handling;
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        error_handling::into_response(self.clone())
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error, Clone)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("server start failure: {0}")]
    StartServer(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("internal server error")]
    Internal,

    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl From<tokio_postgres::Error> for AppError {
    fn from(e: tokio_postgres::Error) -> Self {
        AppError::Database(e.to_string())
    }
}

impl From<deadpool_postgres::PoolError> for AppError {
    fn from(e: deadpool_postgres::PoolError) -> Self {
        AppError::Database(e.to_string())
    }
}

// actix-web provides a blanket From<T: ResponseError> for actix_web::Error,
// so handlers can return AppError directly.

impl AppError {
    /// Returns HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::BadRequest(_) => 400,
            AppError::Unauthorized => 401,
            AppError::Forbidden => 403,
            AppError::NotFound => 404,
            AppError::Conflict(_) => 409,
            AppError::ServiceUnavailable(_) => 503,
            AppError::Database(_)
            | AppError::Internal
            | AppError::Config(_)
            | AppError::StartServer(_) => 500,
        }
    }
}
