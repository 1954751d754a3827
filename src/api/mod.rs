pub mod handlers;
pub mod routes;
pub mod users;

pub use routes::*;

use crate::accounts::UserService;
use crate::auth::TokenService;
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::processing::IncidentProcessor;
use crate::state::Stores;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub processor: Arc<IncidentProcessor>,
    pub users: Arc<UserService>,
    pub tokens: Arc<TokenService>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        processor: Arc<IncidentProcessor>,
        users: Arc<UserService>,
        tokens: Arc<TokenService>,
    ) -> Self {
        Self {
            processor,
            users,
            tokens,
            started_at: Instant::now(),
        }
    }

    /// Wire services over `stores`; fails without a signing secret
    pub fn from_config(config: &Config, stores: Stores) -> Result<Self> {
        let secret = config.auth.resolve_secret().ok_or_else(|| {
            AppError::Configuration(format!(
                "JWT secret not configured (set auth.jwt_secret or {})",
                config.auth.jwt_secret_env
            ))
        })?;

        let tokens = Arc::new(TokenService::new(
            &secret,
            chrono::Duration::hours(config.auth.token_ttl_hours),
        ));
        let processor = Arc::new(IncidentProcessor::new(stores.incidents));
        let users = Arc::new(UserService::new(
            stores.users,
            tokens.clone(),
            config.auth.bcrypt_cost,
        ));

        Ok(Self::new(processor, users, tokens))
    }
}

/// Parse a path id, rejecting anything that is not a UUID
pub(crate) fn parse_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::Validation("Invalid ID format.".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id() {
        let id = Uuid::new_v4();
        assert_eq!(parse_id(&id.to_string()).unwrap(), id);

        let err = parse_id("64f1c2e9a1b2c3d4e5f60718").unwrap_err();
        assert_eq!(err.to_string(), "Invalid ID format.");
    }
}
