//! Session tokens for the back-office.
//!
//! Tokens carry identity only. Permissions are resolved from the store on
//! every request, so role changes apply without re-issuing tokens.

use axum::http::{HeaderMap, header};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "crm_session";

#[derive(Debug, Error)]
pub enum AuthnError {
    #[error("session secret must not be empty")]
    EmptySecret,
    #[error("session ttl must be positive, got {0} minutes")]
    InvalidTtl(i64),
    #[error("invalid session token: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub session_ttl_minutes: i64,
}

impl AuthConfig {
    pub fn new(jwt_secret: impl Into<String>, session_ttl_minutes: i64) -> Result<Self, AuthnError> {
        let jwt_secret = jwt_secret.into();
        if jwt_secret.is_empty() {
            return Err(AuthnError::EmptySecret);
        }
        if session_ttl_minutes <= 0 {
            return Err(AuthnError::InvalidTtl(session_ttl_minutes));
        }
        Ok(Self {
            jwt_secret,
            session_ttl_minutes,
        })
    }

    fn encoding_key(&self) -> EncodingKey {
        EncodingKey::from_secret(self.jwt_secret.as_bytes())
    }

    fn decoding_key(&self) -> DecodingKey {
        DecodingKey::from_secret(self.jwt_secret.as_bytes())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: Uuid,
    pub exp: usize,
    pub iat: usize,
}

pub fn issue_token(user_id: Uuid, config: &AuthConfig) -> Result<String, AuthnError> {
    let now = Utc::now();
    let exp = now
        .checked_add_signed(Duration::minutes(config.session_ttl_minutes))
        .unwrap_or(now)
        .timestamp() as usize;
    let claims = SessionClaims {
        sub: user_id,
        exp,
        iat: now.timestamp() as usize,
    };
    Ok(jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &config.encoding_key(),
    )?)
}

pub fn decode_token(token: &str, config: &AuthConfig) -> Result<SessionClaims, AuthnError> {
    let data =
        jsonwebtoken::decode::<SessionClaims>(token, &config.decoding_key(), &Validation::default())?;
    Ok(data.claims)
}

/// Bearer header first, then the session cookie.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers.get(header::AUTHORIZATION) {
        if let Ok(text) = value.to_str() {
            if let Some(rest) = text.strip_prefix("Bearer ") {
                let token = rest.trim();
                if !token.is_empty() {
                    return Some(token.to_string());
                }
            }
        }
    }
    for cookie in headers.get_all(header::COOKIE) {
        let Ok(text) = cookie.to_str() else {
            continue;
        };
        for part in text.split(';') {
            if let Some((name, value)) = part.trim().split_once('=') {
                if name == SESSION_COOKIE && !value.trim().is_empty() {
                    return Some(value.trim().to_string());
                }
            }
        }
    }
    None
}

/// Resolves the caller's user id, or `None` when no valid session is present.
pub fn authenticate(headers: &HeaderMap, config: &AuthConfig) -> Option<Uuid> {
    let token = extract_token(headers)?;
    decode_token(&token, config).ok().map(|claims| claims.sub)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn config() -> AuthConfig {
        AuthConfig::new("test-secret", 15).unwrap()
    }

    #[test]
    fn tokens_round_trip_identity_only() {
        let user = Uuid::new_v4();
        let token = issue_token(user, &config()).unwrap();
        let claims = decode_token(&token, &config()).unwrap();
        assert_eq!(claims.sub, user);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn foreign_secret_is_rejected() {
        let token = issue_token(Uuid::new_v4(), &config()).unwrap();
        let other = AuthConfig::new("another-secret", 15).unwrap();
        assert!(matches!(decode_token(&token, &other), Err(AuthnError::Token(_))));
    }

    #[test]
    fn config_rejects_bad_values() {
        assert!(matches!(AuthConfig::new("", 15), Err(AuthnError::EmptySecret)));
        assert!(matches!(AuthConfig::new("s", 0), Err(AuthnError::InvalidTtl(0))));
    }

    #[test]
    fn bearer_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        headers.insert(header::COOKIE, HeaderValue::from_static("crm_session=def"));
        assert_eq!(extract_token(&headers).as_deref(), Some("abc"));
    }

    #[test]
    fn session_cookie_is_found_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; crm_session_old=x; crm_session=tok"),
        );
        assert_eq!(extract_token(&headers).as_deref(), Some("tok"));
    }

    #[test]
    fn authenticate_ignores_garbage() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer nope"));
        assert_eq!(authenticate(&headers, &config()), None);
        assert_eq!(authenticate(&HeaderMap::new(), &config()), None);
    }
}
