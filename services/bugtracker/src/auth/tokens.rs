//! JWT access/refresh token minting and verification.
//!
//! # Purpose
//! Issues the token pair returned by login and validates bearer tokens on
//! every authenticated request.
//!
//! # Key invariants
//! - Tokens are HS256 with a server-side secret; `iss` must match the
//!   configured issuer.
//! - `token_type` separates access from refresh tokens. An access token is
//!   never accepted where a refresh token is expected, and vice versa.
//! - Every token carries a random `jti`; logout blacklists refresh tokens by
//!   that id.
//!
//! # Security notes
//! - Never log raw tokens or the signing secret.
use crate::config::AuthConfig;
use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub iss: String,
    /// User id, as a string per JWT convention.
    pub sub: String,
    pub token_type: TokenType,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn user_id(&self) -> Result<i64, TokenError> {
        self.sub.parse().map_err(|_| TokenError::InvalidSubject)
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0)
            .single()
            .unwrap_or_else(Utc::now)
    }
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("jwt error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("expected {0} token")]
    WrongType(&'static str),
    #[error("token is blacklisted")]
    Blacklisted,
    #[error("token subject is not a user id")]
    InvalidSubject,
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Signs and verifies tokens with one shared secret.
#[derive(Clone)]
pub struct TokenIssuer {
    issuer: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("issuer", &self.issuer)
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig) -> Self {
        let secret = config.jwt_secret.as_bytes();
        Self {
            issuer: config.issuer.clone(),
            access_ttl: Duration::from_secs(config.access_ttl_secs),
            refresh_ttl: Duration::from_secs(config.refresh_ttl_secs),
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }

    pub fn mint_pair(&self, user_id: i64) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access: self.mint(user_id, TokenType::Access, self.access_ttl)?,
            refresh: self.mint(user_id, TokenType::Refresh, self.refresh_ttl)?,
        })
    }

    pub fn mint_access(&self, user_id: i64) -> Result<String, TokenError> {
        self.mint(user_id, TokenType::Access, self.access_ttl)
    }

    fn mint(&self, user_id: i64, token_type: TokenType, ttl: Duration) -> Result<String, TokenError> {
        let now = now_epoch_seconds();
        let claims = Claims {
            iss: self.issuer.clone(),
            sub: user_id.to_string(),
            token_type,
            jti: Uuid::new_v4().simple().to_string(),
            iat: now,
            exp: now + ttl.as_secs() as i64,
        };
        Ok(jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.encoding,
        )?)
    }

    /// Checks signature, issuer, expiry, and token type.
    ///
    /// Blacklist checks are the caller's job since they need the store.
    pub fn verify(&self, token: &str, expected: TokenType) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.leeway = 0;
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding, &validation)?;
        if data.claims.token_type != expected {
            return Err(TokenError::WrongType(expected.as_str()));
        }
        data.claims.user_id()?;
        Ok(data.claims)
    }
}

fn now_epoch_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0))
        .as_secs() as i64
}

/// Pulls the token out of an `Authorization: Bearer <token>` header.
pub fn extract_bearer(headers: &axum::http::HeaderMap) -> Option<&str> {
    let value = headers.get(axum::http::header::AUTHORIZATION)?;
    let value = value.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    if token.is_empty() {
        return None;
    }
    Some(token)
}
