//! JWT signing and validation helpers.
//!
//! Keys are installed once at process start via [`initialize_jwt`]; validation
//! before initialization fails rather than falling back to an insecure
//! default.

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, TokenData, Validation};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

static ENCODING_KEY: OnceCell<EncodingKey> = OnceCell::new();
static DECODING_KEY: OnceCell<DecodingKey> = OnceCell::new();

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("jwt keys not initialized")]
    NotInitialized,
    #[error("jwt keys already initialized")]
    AlreadyInitialized,
    #[error("token invalid: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),
}

/// Bearer token claims. `sub` carries the user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

/// Install HS256 keys derived from the shared secret. Call once at startup.
pub fn initialize_jwt(secret: &[u8]) -> Result<(), JwtError> {
    ENCODING_KEY
        .set(EncodingKey::from_secret(secret))
        .map_err(|_| JwtError::AlreadyInitialized)?;
    DECODING_KEY
        .set(DecodingKey::from_secret(secret))
        .map_err(|_| JwtError::AlreadyInitialized)?;
    Ok(())
}

/// Sign a token for the given user id, valid for `ttl_secs`.
pub fn sign_token(user_id: Uuid, ttl_secs: i64) -> Result<String, JwtError> {
    let key = ENCODING_KEY.get().ok_or(JwtError::NotInitialized)?;
    let claims = Claims {
        sub: user_id.to_string(),
        exp: (chrono::Utc::now().timestamp() + ttl_secs) as usize,
    };
    Ok(encode(&Header::default(), &claims, key)?)
}

/// Validate a bearer token and return its claims.
pub fn validate_token(token: &str) -> Result<TokenData<Claims>, JwtError> {
    let key = DECODING_KEY.get().ok_or(JwtError::NotInitialized)?;
    Ok(decode::<Claims>(token, key, &Validation::default())?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_validate_round_trip() {
        // OnceCell is process-wide; initialize exactly once for all tests here.
        let _ = initialize_jwt(b"test-secret");

        let user_id = Uuid::new_v4();
        let token = sign_token(user_id, 60).unwrap();
        let data = validate_token(&token).unwrap();
        assert_eq!(data.claims.sub, user_id.to_string());
    }

    #[test]
    fn expired_token_is_rejected() {
        let _ = initialize_jwt(b"test-secret");

        let token = sign_token(Uuid::new_v4(), -120).unwrap();
        assert!(validate_token(&token).is_err());
    }
}
