use dotenvy::dotenv;
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    /// Shared HS256 secret for bearer-token validation
    pub jwt_secret: String,
    /// Seconds before an unrefreshed typing indicator expires
    pub typing_ttl_secs: u64,
    /// Interval for the typing-state sweeper task
    pub typing_sweep_interval_secs: u64,
    /// Maximum messages per history page
    pub message_page_limit: i64,
    /// Maximum conversations returned by the list endpoint
    pub conversation_list_limit: i64,
}

impl Config {
    pub fn from_env() -> Result<Self, crate::error::AppError> {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| crate::error::AppError::Config("DATABASE_URL missing".into()))?;
        let port = env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3000);
        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| crate::error::AppError::Config("JWT_SECRET missing".into()))?;
        if jwt_secret.len() < 32 {
            return Err(crate::error::AppError::Config(
                "JWT_SECRET must be at least 32 bytes".into(),
            ));
        }

        let typing_ttl_secs = env::var("TYPING_TTL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5);
        let typing_sweep_interval_secs = env::var("TYPING_SWEEP_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(2);
        let message_page_limit = positive_limit("MESSAGE_PAGE_LIMIT", 50)?;
        let conversation_list_limit = positive_limit("CONVERSATION_LIST_LIMIT", 100)?;

        Ok(Self {
            database_url,
            port,
            jwt_secret,
            typing_ttl_secs,
            typing_sweep_interval_secs,
            message_page_limit,
            conversation_list_limit,
        })
    }
}

/// Page limits feed straight into SQL LIMIT clauses and `clamp` bounds, so
/// zero or negative values are rejected at startup rather than at request
/// time.
fn positive_limit(name: &str, default: i64) -> Result<i64, crate::error::AppError> {
    match env::var(name) {
        Err(_) => Ok(default),
        Ok(raw) => {
            let value: i64 = raw.parse().map_err(|_| {
                crate::error::AppError::Config(format!("{name} must be an integer"))
            })?;
            if value < 1 {
                return Err(crate::error::AppError::Config(format!(
                    "{name} must be at least 1"
                )));
            }
            Ok(value)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_database_url_is_a_config_error() {
        // Only assert behavior when the variable is genuinely absent; CI
        // environments that define DATABASE_URL skip the negative branch.
        if env::var("DATABASE_URL").is_err() {
            assert!(Config::from_env().is_err());
        }
    }

    #[test]
    fn unset_limit_takes_the_default() {
        assert_eq!(positive_limit("LIMIT_TEST_UNSET", 50).unwrap(), 50);
    }

    #[test]
    fn zero_limit_is_rejected_at_startup() {
        env::set_var("LIMIT_TEST_ZERO", "0");
        assert!(positive_limit("LIMIT_TEST_ZERO", 50).is_err());
        env::remove_var("LIMIT_TEST_ZERO");
    }

    #[test]
    fn negative_and_garbage_limits_are_rejected() {
        env::set_var("LIMIT_TEST_NEGATIVE", "-3");
        assert!(positive_limit("LIMIT_TEST_NEGATIVE", 50).is_err());
        env::remove_var("LIMIT_TEST_NEGATIVE");

        env::set_var("LIMIT_TEST_GARBAGE", "plenty");
        assert!(positive_limit("LIMIT_TEST_GARBAGE", 50).is_err());
        env::remove_var("LIMIT_TEST_GARBAGE");
    }

    #[test]
    fn valid_limit_is_passed_through() {
        env::set_var("LIMIT_TEST_VALID", "25");
        assert_eq!(positive_limit("LIMIT_TEST_VALID", 50).unwrap(), 25);
        env::remove_var("LIMIT_TEST_VALID");
    }
}
