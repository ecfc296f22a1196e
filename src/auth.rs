use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::database::{AuthUser, Database};
use crate::error::ApiError;

pub const ACCESS_TOKEN_EXPIRE_MINUTES: i64 = 300;

/// Signing key pair built once at startup from the fetched secret and passed
/// around by handle, so tests can run with their own keys.
#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenKeys {
    pub fn new(secret: &[u8]) -> Self {
        TokenKeys {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthClaims {
    pub sub: Option<String>, // Subject username; absent in defective tokens
    pub exp: usize,          // Expiration time
    pub iat: usize,          // Issued at
}

#[derive(Debug, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Token expired")]
    Expired,
    #[error("Invalid token")]
    Malformed,
    #[error("Token has no subject")]
    MissingSubject,
}

pub fn create_access_token(
    keys: &TokenKeys,
    username: &str,
    expires_delta: Option<Duration>,
) -> Result<String, AuthError> {
    let ttl = expires_delta.unwrap_or_else(|| Duration::minutes(ACCESS_TOKEN_EXPIRE_MINUTES));
    let now = Utc::now();
    let expire = now + ttl;

    let claims = AuthClaims {
        sub: Some(username.to_string()),
        exp: expire.timestamp() as usize,
        iat: now.timestamp() as usize,
    };

    debug!("Token created for {} with expiry {}", username, expire);
    encode(&Header::default(), &claims, &keys.encoding).map_err(|_| AuthError::Malformed)
}

pub fn verify_token(keys: &TokenKeys, token: &str) -> Result<String, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;

    let data =
        decode::<AuthClaims>(token, &keys.decoding, &validation).map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::Expired,
            _ => AuthError::Malformed,
        })?;

    data.claims.sub.ok_or(AuthError::MissingSubject)
}

/// Resolves a presented bearer token to the identity record it names.
pub async fn resolve_identity(
    db: &Database,
    keys: &TokenKeys,
    token: &str,
) -> Result<AuthUser, ApiError> {
    let username = verify_token(keys, token)?;
    debug!("Username from token: {}", username);

    match db.get_user_by_username(&username).await? {
        Some(user) => Ok(user),
        // A valid signature over an unknown subject must not reveal whether
        // the account ever existed.
        None => Err(ApiError::Unauthorized("Invalid token".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_returns_subject() {
        let keys = TokenKeys::new(b"test-secret");
        let token = create_access_token(&keys, "alice", None).unwrap();
        assert_eq!(verify_token(&keys, &token).unwrap(), "alice");
    }

    #[test]
    fn expired_token_is_rejected() {
        let keys = TokenKeys::new(b"test-secret");
        let token = create_access_token(&keys, "alice", Some(Duration::minutes(-5))).unwrap();
        assert_eq!(verify_token(&keys, &token), Err(AuthError::Expired));
    }

    #[test]
    fn token_from_other_key_is_malformed() {
        let keys = TokenKeys::new(b"test-secret");
        let other = TokenKeys::new(b"another-secret");
        let token = create_access_token(&keys, "alice", None).unwrap();
        assert_eq!(verify_token(&other, &token), Err(AuthError::Malformed));
    }

    #[test]
    fn token_without_subject_is_rejected() {
        #[derive(serde::Serialize)]
        struct BareClaims {
            exp: usize,
            iat: usize,
        }

        let keys = TokenKeys::new(b"test-secret");
        let now = Utc::now().timestamp() as usize;
        let claims = BareClaims {
            exp: now + 600,
            iat: now,
        };
        let token = encode(&Header::default(), &claims, &keys.encoding).unwrap();
        assert_eq!(verify_token(&keys, &token), Err(AuthError::MissingSubject));
    }

    #[test]
    fn garbage_token_is_malformed() {
        let keys = TokenKeys::new(b"test-secret");
        assert_eq!(
            verify_token(&keys, "not.a.token"),
            Err(AuthError::Malformed)
        );
    }
}
