use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::AuthConfig;
use crate::db::DbUser;
use crate::error::ApiError;
use crate::types::TokenPair;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub username: String,
    pub token_type: TokenKind,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
}

/// Signs and verifies the HS256 access/refresh token pair.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenIssuer {
    pub fn new(cfg: &AuthConfig) -> Self {
        Self::with_ttls(
            cfg.secret_key.as_bytes(),
            Duration::minutes(cfg.access_token_minutes),
            Duration::days(cfg.refresh_token_days),
        )
    }

    pub fn with_ttls(secret: &[u8], access_ttl: Duration, refresh_ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn issue_pair(&self, user: &DbUser) -> Result<TokenPair, ApiError> {
        Ok(TokenPair {
            access_token: self.issue(user, TokenKind::Access)?,
            refresh_token: self.issue(user, TokenKind::Refresh)?,
            token_type: "bearer".to_string(),
        })
    }

    pub fn issue(&self, user: &DbUser, kind: TokenKind) -> Result<String, ApiError> {
        let now = Utc::now();
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let claims = Claims {
            sub: user.id.clone(),
            email: user.email.clone(),
            username: user.username.clone(),
            token_type: kind,
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
            jti: uuid::Uuid::new_v4().to_string(),
        };
        encode(&Header::default(), &claims, &self.encoding).map_err(ApiError::TokenEncoding)
    }

    /// Decode `token` and require it to be of `expected` kind.
    pub fn verify(&self, token: &str, expected: TokenKind) -> Result<Claims, ApiError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| {
            debug!(error = %e, "token rejected");
            ApiError::unauthorized("Could not validate credentials")
        })?;
        if data.claims.token_type != expected {
            return Err(ApiError::unauthorized("Could not validate credentials"));
        }
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> DbUser {
        DbUser::new("ada@example.com".into(), "ada".into(), "h".into(), None)
    }

    fn issuer() -> TokenIssuer {
        TokenIssuer::with_ttls(b"test-secret", Duration::minutes(15), Duration::days(7))
    }

    #[test]
    fn pair_round_trips_with_kinds() {
        let issuer = issuer();
        let user = user();
        let pair = issuer.issue_pair(&user).unwrap();
        assert_eq!(pair.token_type, "bearer");

        let access = issuer.verify(&pair.access_token, TokenKind::Access).unwrap();
        assert_eq!(access.sub, user.id);
        let refresh = issuer.verify(&pair.refresh_token, TokenKind::Refresh).unwrap();
        assert!(refresh.exp > access.exp);
    }

    #[test]
    fn refresh_token_is_not_an_access_token() {
        let issuer = issuer();
        let pair = issuer.issue_pair(&user()).unwrap();
        assert!(issuer.verify(&pair.refresh_token, TokenKind::Access).is_err());
        assert!(issuer.verify(&pair.access_token, TokenKind::Refresh).is_err());
    }

    #[test]
    fn expired_and_foreign_tokens_are_rejected() {
        let expired = TokenIssuer::with_ttls(b"test-secret", Duration::seconds(-30), Duration::days(7));
        let token = expired.issue(&user(), TokenKind::Access).unwrap();
        assert!(issuer().verify(&token, TokenKind::Access).is_err());

        let foreign = TokenIssuer::with_ttls(b"other", Duration::minutes(5), Duration::days(7));
        let token = foreign.issue(&user(), TokenKind::Access).unwrap();
        assert!(issuer().verify(&token, TokenKind::Access).is_err());
    }

    #[test]
    fn consecutive_tokens_differ() {
        let issuer = issuer();
        let user = user();
        let a = issuer.issue(&user, TokenKind::Access).unwrap();
        let b = issuer.issue(&user, TokenKind::Access).unwrap();
        assert_ne!(a, b);
    }
}
