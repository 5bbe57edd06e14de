//! Signing and verification of access/refresh JWTs.
//!
//! Both token kinds carry the same claims shape and differ only in signing
//! secret and TTL. Verification distinguishes an expired token from a
//! malformed or forged one so clients know when to attempt a refresh.

use chrono::Utc;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

const MIN_SECRET_BYTES: usize = 32;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("token invalid")]
    Invalid,
    #[error("token signing failed")]
    Signing,
}

/// Identity payload embedded in every token.
#[derive(Debug, Clone)]
pub struct UserClaims {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub role: String,
}

/// Full claims set as it appears on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub role: String,
    pub sub: Uuid,
    pub iat: i64,
    pub exp: i64,
    /// Per-token nonce. `iat` has second granularity, so without it two
    /// tokens signed in the same second would be byte-identical and rotation
    /// could reissue the token it just retired.
    pub jti: Uuid,
}

pub struct TokenCodec {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_ttl_seconds: i64,
    refresh_ttl_seconds: i64,
}

impl TokenCodec {
    /// Build a codec from the two signing secrets.
    ///
    /// # Errors
    /// Returns an error if either secret is shorter than 32 bytes or the two
    /// secrets are identical; both are fatal configuration mistakes.
    pub fn new(
        access_secret: &SecretString,
        refresh_secret: &SecretString,
        access_ttl_seconds: i64,
        refresh_ttl_seconds: i64,
    ) -> anyhow::Result<Self> {
        let access = access_secret.expose_secret();
        let refresh = refresh_secret.expose_secret();

        if access.len() < MIN_SECRET_BYTES || refresh.len() < MIN_SECRET_BYTES {
            anyhow::bail!("token secrets must be at least {MIN_SECRET_BYTES} bytes");
        }
        if access == refresh {
            anyhow::bail!("access and refresh token secrets must differ");
        }

        Ok(Self {
            access_encoding: EncodingKey::from_secret(access.as_bytes()),
            access_decoding: DecodingKey::from_secret(access.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(refresh.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(refresh.as_bytes()),
            access_ttl_seconds,
            refresh_ttl_seconds,
        })
    }

    /// Sign a short-lived access token.
    ///
    /// # Errors
    /// Returns `TokenError::Signing` if serialization fails.
    pub fn sign_access(&self, user: &UserClaims) -> Result<String, TokenError> {
        sign(user, &self.access_encoding, self.access_ttl_seconds)
    }

    /// Sign a refresh token with the distinct refresh secret.
    ///
    /// # Errors
    /// Returns `TokenError::Signing` if serialization fails.
    pub fn sign_refresh(&self, user: &UserClaims) -> Result<String, TokenError> {
        sign(user, &self.refresh_encoding, self.refresh_ttl_seconds)
    }

    /// Verify an access token's signature and expiry.
    ///
    /// # Errors
    /// `TokenError::Expired` once the expiry has passed, `TokenError::Invalid`
    /// for any signature or structure problem.
    pub fn verify_access(&self, token: &str) -> Result<Claims, TokenError> {
        verify(token, &self.access_decoding)
    }

    /// Verify a refresh token's signature and expiry.
    ///
    /// # Errors
    /// Same contract as [`Self::verify_access`].
    pub fn verify_refresh(&self, token: &str) -> Result<Claims, TokenError> {
        verify(token, &self.refresh_decoding)
    }

    #[must_use]
    pub const fn refresh_ttl_seconds(&self) -> i64 {
        self.refresh_ttl_seconds
    }
}

fn sign(user: &UserClaims, key: &EncodingKey, ttl_seconds: i64) -> Result<String, TokenError> {
    let iat = Utc::now().timestamp();
    let claims = Claims {
        id: user.id,
        email: user.email.clone(),
        username: user.username.clone(),
        role: user.role.clone(),
        sub: user.id,
        iat,
        exp: iat + ttl_seconds,
        jti: Uuid::new_v4(),
    };
    encode(&Header::new(Algorithm::HS256), &claims, key).map_err(|_| TokenError::Signing)
}

fn verify(token: &str, key: &DecodingKey) -> Result<Claims, TokenError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    decode::<Claims>(token, key, &validation)
        .map(|data| data.claims)
        .map_err(|err| match err.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Invalid,
        })
}
