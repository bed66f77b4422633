//! Bearer token verification. Tokens are issued elsewhere; this side only
//! checks the HS256 signature and expiry and reads the subject.

use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use stockyard_core::UserId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Authenticated user.
    pub sub: UserId,
    /// Expiry, seconds since the epoch.
    pub exp: i64,
    #[serde(default)]
    pub iat: Option<i64>,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid token: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),
}

pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str) -> Result<Claims, TokenError>;
}

pub struct Hs256JwtValidator {
    key: DecodingKey,
    validation: Validation,
}

impl Hs256JwtValidator {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            key: DecodingKey::from_secret(secret),
            validation: Validation::new(Algorithm::HS256),
        }
    }
}

impl JwtValidator for Hs256JwtValidator {
    fn validate(&self, token: &str) -> Result<Claims, TokenError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.key, &self.validation)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header};

    fn mint(secret: &[u8], exp: i64) -> String {
        let claims = Claims {
            sub: UserId::new(),
            exp,
            iat: None,
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(secret))
            .unwrap()
    }

    #[test]
    fn accepts_own_signature_only() {
        let exp = chrono::Utc::now().timestamp() + 600;
        let validator = Hs256JwtValidator::new(b"secret");
        assert!(validator.validate(&mint(b"secret", exp)).is_ok());
        assert!(validator.validate(&mint(b"other", exp)).is_err());
    }

    #[test]
    fn rejects_expired_tokens() {
        let validator = Hs256JwtValidator::new(b"secret");
        let exp = chrono::Utc::now().timestamp() - 3_600;
        assert!(validator.validate(&mint(b"secret", exp)).is_err());
    }
}
