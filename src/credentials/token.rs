use std::{collections::HashSet, fmt, sync::Arc};

use chrono::TimeDelta;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::Zeroizing;

use crate::user::{Session, UserId};

pub const TOKEN_TTL_HOURS: i64 = 24;

/// Signed payload of a bearer token. Times are seconds since the epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: UserId,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Token is malformed or its signature does not match")]
    Invalid(#[source] jsonwebtoken::errors::Error),
    #[error("Token expired at {exp}")]
    Expired { exp: i64 },
    #[error("Failed to sign token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

/// Mints and checks HS256 tokens valid for [`TOKEN_TTL_HOURS`].
///
/// Tokens are stateless: nothing is remembered between calls, so a token
/// stays valid until it expires.
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl TokenIssuer {
    pub fn new(secret: &[u8], clock: Arc<dyn Clock + Send + Sync>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // expiry is checked against the injected clock in `verify`
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.required_spec_claims = HashSet::from(["exp".to_owned()]);
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            clock,
        }
    }

    pub fn issue(&self, session: &Session) -> Result<Zeroizing<String>, TokenError> {
        let now = self.clock.utc();
        let claims = Claims {
            user_id: session.user_id,
            email: session.email.clone(),
            iat: now.timestamp(),
            exp: (now + TimeDelta::hours(TOKEN_TTL_HOURS)).timestamp(),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map(Zeroizing::new)
            .map_err(TokenError::Signing)
    }

    pub fn verify(&self, token: &str) -> Result<Session, TokenError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(TokenError::Invalid)?;
        let claims = data.claims;
        if self.clock.utc().timestamp() >= claims.exp {
            return Err(TokenError::Expired { exp: claims.exp });
        }
        Ok(Session {
            user_id: claims.user_id,
            email: claims.email,
        })
    }
}

impl fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenIssuer").finish_non_exhaustive()
    }
}
