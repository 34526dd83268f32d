//! Shared actix-web middleware for the messaging workspace.

pub mod jwt;
pub mod jwt_auth;
pub mod logging;
pub mod request_id;

pub use jwt::{initialize_jwt, sign_token, validate_token, Claims, JwtError};
pub use jwt_auth::{JwtAuthMiddleware, UserId};
pub use logging::Logging;
pub use request_id::RequestId;
