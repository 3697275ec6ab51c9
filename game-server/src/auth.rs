use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

use game_types::ConnectionError;

/// Claims carried by bearer tokens issued for this service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,        // User id
    pub exp: u64,           // Expiry, seconds since epoch
    pub email: Option<String>,
    pub name: Option<String>,
}

/// Who a token says the caller is. Profiles are created or loaded from this.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    pub email: Option<String>,
    pub display_name: String,
}

enum Mode {
    Dev,
    Jwt { key: DecodingKey },
}

pub struct AuthService {
    mode: Mode,
}

impl AuthService {
    pub fn new(jwt_secret: &str) -> Self {
        Self {
            mode: Mode::Jwt {
                key: DecodingKey::from_secret(jwt_secret.as_bytes()),
            },
        }
    }

    pub fn new_dev_mode() -> Self {
        Self { mode: Mode::Dev }
    }

    pub fn is_dev_mode(&self) -> bool {
        matches!(self.mode, Mode::Dev)
    }

    pub fn validate_token(&self, token: &str) -> Result<Identity, AuthError> {
        match &self.mode {
            Mode::Dev => Self::validate_dev_token(token),
            Mode::Jwt { key } => Self::validate_jwt(token, key),
        }
    }

    /// Accepts `Bearer <token>` or a bare token.
    pub fn validate_header(&self, header: &str) -> Result<Identity, AuthError> {
        let token = header.strip_prefix("Bearer ").unwrap_or(header);
        self.validate_token(token.trim())
    }

    fn validate_jwt(token: &str, key: &DecodingKey) -> Result<Identity, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false; // checked below to report expiry separately
        validation.required_spec_claims.clear();

        let claims = decode::<Claims>(token, key, &validation)
            .map_err(|e| {
                tracing::warn!("JWT validation failed: {:?}", e);
                AuthError::InvalidToken
            })?
            .claims;

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or_default();
        if claims.exp < now {
            tracing::warn!("Token expired: exp={}, now={}", claims.exp, now);
            return Err(AuthError::TokenExpired);
        }
        if claims.sub.trim().is_empty() {
            return Err(AuthError::InvalidToken);
        }

        let display_name = claims
            .name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| claims.sub.clone());
        Ok(Identity {
            id: claims.sub,
            email: claims.email.filter(|email| !email.is_empty()),
            display_name,
        })
    }

    /// Dev tokens are plain `user_id:email:name` strings.
    fn validate_dev_token(token: &str) -> Result<Identity, AuthError> {
        let mut parts = token.splitn(3, ':');
        let (Some(id), Some(email), Some(name)) = (parts.next(), parts.next(), parts.next()) else {
            tracing::debug!("Malformed dev token");
            return Err(AuthError::InvalidToken);
        };
        if id.trim().is_empty() || name.trim().is_empty() {
            return Err(AuthError::InvalidToken);
        }

        Ok(Identity {
            id: id.trim().to_string(),
            email: Some(email.trim().to_string()).filter(|email| !email.is_empty()),
            display_name: name.trim().to_string(),
        })
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    TokenExpired,
}

impl From<AuthError> for ConnectionError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidToken => ConnectionError::InvalidToken,
            AuthError::TokenExpired => ConnectionError::SessionExpired,
        }
    }
}
