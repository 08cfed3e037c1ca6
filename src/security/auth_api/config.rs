use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::types::{Caller, Role};

/// JWT claims minted by the login flow.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

#[derive(Clone)]
pub struct AuthConfig {
    jwt_secret: String,
    pub token_ttl_hours: i64,
}

impl AuthConfig {
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            token_ttl_hours: 24,
        }
    }

    pub fn encoding_key(&self) -> EncodingKey {
        EncodingKey::from_secret(self.jwt_secret.as_bytes())
    }

    pub fn decoding_key(&self) -> DecodingKey {
        DecodingKey::from_secret(self.jwt_secret.as_bytes())
    }

    pub fn issue_token(&self, caller: &Caller) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let claims = Claims {
            sub: caller.user_id.to_string(),
            email: caller.email.clone(),
            role: caller.role,
            iat: now.timestamp(),
            exp: (now + Duration::hours(self.token_ttl_hours)).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding_key())
    }

    /// Resolves a bearer token to a caller. Any defect in the token yields `None`.
    pub fn resolve(&self, token: &str) -> Option<Caller> {
        let claims = decode::<Claims>(token, &self.decoding_key(), &Validation::default())
            .map_err(|e| log::debug!("Rejected bearer token: {e}"))
            .ok()?
            .claims;
        let user_id = Uuid::parse_str(&claims.sub).ok()?;
        Some(Caller::new(user_id, claims.email, claims.role))
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"[REDACTED]")
            .field("token_ttl_hours", &self.token_ttl_hours)
            .finish()
    }
}
