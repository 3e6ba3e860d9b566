use std::collections::HashSet;

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::debug;

use crate::config::JwtConfig;

/// Claims carried by an access token. Exactly these two fields go on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: String, // user email
    pub exp: i64,    // expires at (unix timestamp)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("token is invalid")]
    Invalid,

    #[error("token has expired")]
    Expired,

    #[error("failed to sign token: {0}")]
    Encoding(String),
}

/// Signs and checks access tokens. Never reads the clock itself.
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    algorithm: Algorithm,
}

impl TokenCodec {
    pub fn new(secret: &[u8], algorithm: Algorithm) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            algorithm,
        }
    }

    pub fn from_config(cfg: &JwtConfig) -> anyhow::Result<Self> {
        Ok(Self::new(cfg.secret.as_bytes(), cfg.algorithm()?))
    }

    pub fn encode(
        &self,
        subject: &str,
        now: OffsetDateTime,
        ttl_minutes: i64,
    ) -> Result<String, TokenError> {
        if ttl_minutes <= 0 {
            return Err(TokenError::Encoding(format!(
                "ttl must be positive, got {} minutes",
                ttl_minutes
            )));
        }
        let exp = ttl_minutes
            .checked_mul(60)
            .and_then(|secs| now.unix_timestamp().checked_add(secs))
            .ok_or_else(|| TokenError::Encoding("token expiry overflows".into()))?;
        let claims = Claims {
            sub: subject.to_owned(),
            exp,
        };
        let token = encode(&Header::new(self.algorithm), &claims, &self.encoding)
            .map_err(|e| TokenError::Encoding(e.to_string()))?;
        debug!(sub = %claims.sub, exp = claims.exp, "jwt signed");
        Ok(token)
    }

    pub fn decode(&self, token: &str, now: OffsetDateTime) -> Result<Claims, TokenError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation()).map_err(|e| {
            debug!(error = %e, "jwt rejected");
            TokenError::Invalid
        })?;

        let claims = data.claims;
        if claims.exp <= now.unix_timestamp() {
            debug!(sub = %claims.sub, exp = claims.exp, "jwt expired");
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }

    /// Signature, algorithm and claim presence only. Expiry is checked against
    /// the caller's `now` in `decode`.
    fn validation(&self) -> Validation {
        let mut validation = Validation::new(self.algorithm);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.required_spec_claims =
            HashSet::from(["exp".to_string(), "sub".to_string()]);
        validation
    }
}
