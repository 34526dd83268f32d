use crate::error::AppError;
use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use error_types::{error_codes, ErrorResponse};
use tracing::{error, warn};

fn error_code(err: &AppError) -> &'static str {
    match err {
        AppError::BadRequest(_) => error_codes::BAD_REQUEST,
        AppError::Unauthorized => error_codes::UNAUTHORIZED,
        AppError::Forbidden => error_codes::FORBIDDEN,
        AppError::NotFound => error_codes::NOT_FOUND,
        AppError::Conflict(_) => error_codes::CONFLICT,
        AppError::ServiceUnavailable(_) => error_codes::SERVICE_UNAVAILABLE,
        AppError::Database(_) => error_codes::DATABASE_ERROR,
        AppError::Internal | AppError::Config(_) | AppError::StartServer(_) => {
            error_codes::INTERNAL_ERROR
        }
    }
}

fn error_type(err: &AppError) -> &'static str {
    match err {
        AppError::BadRequest(_) => "BadRequestError",
        AppError::Unauthorized => "UnauthorizedError",
        AppError::Forbidden => "ForbiddenError",
        AppError::NotFound => "NotFoundError",
        AppError::Conflict(_) => "ConflictError",
        AppError::ServiceUnavailable(_) => "ServiceUnavailableError",
        AppError::Database(_) => "DatabaseError",
        AppError::Internal | AppError::Config(_) | AppError::StartServer(_) => "InternalError",
    }
}

/// Map an [`AppError`] to the workspace-wide JSON error body.
/// Internal failure details are logged, never sent to the client.
pub fn into_response(err: AppError) -> HttpResponse {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let message = if status.is_server_error() {
        error!(error = %err, "request failed");
        "internal server error".to_owned()
    } else {
        warn!(error = %err, "request rejected");
        err.to_string()
    };

    let body = ErrorResponse::new(error_type(&err), &message, status.as_u16(), error_code(&err));
    HttpResponse::build(status).json(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_detail_is_not_leaked() {
        let resp = into_response(AppError::Database("password=hunter2 in dsn".into()));
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn client_errors_keep_their_status() {
        assert_eq!(
            into_response(AppError::NotFound).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            into_response(AppError::Forbidden).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            into_response(AppError::Conflict("pair exists".into())).status(),
            StatusCode::CONFLICT
        );
    }
}
