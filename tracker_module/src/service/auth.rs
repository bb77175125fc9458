//! Signed session tokens for the dashboard API.
//!
//! The OAuth callback issues a 7-day JWT carrying the user and team ids;
//! every `/api/*` handler verifies it before touching core logic.

use axum::http::HeaderMap;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

pub const SESSION_TOKEN_TTL_DAYS: i64 = 7;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub user_id: String,
    pub team_id: String,
    pub exp: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,
    #[error("invalid session token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),
}

/// Sign a session token for a freshly installed user.
pub fn issue_session_token(
    secret: &str,
    user_id: &str,
    team_id: &str,
) -> Result<String, AuthError> {
    let claims = SessionClaims {
        user_id: user_id.to_string(),
        team_id: team_id.to_string(),
        exp: (Utc::now() + Duration::days(SESSION_TOKEN_TTL_DAYS)).timestamp(),
    };
    Ok(encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?)
}

/// Verify a session token and return its claims. Expiry is enforced.
pub fn verify_session_token(secret: &str, token: &str) -> Result<SessionClaims, AuthError> {
    let data = decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(data.claims)
}

/// Extract Bearer token from Authorization header.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|s| s.to_string())
}

/// Per-handler guard: bearer extraction plus signature and expiry checks.
pub fn authenticate(secret: &str, headers: &HeaderMap) -> Result<SessionClaims, AuthError> {
    let token = extract_bearer_token(headers).ok_or(AuthError::MissingToken)?;
    verify_session_token(secret, &token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const SECRET: &str = "test-secret";

    #[test]
    fn issued_token_round_trips() {
        let token = issue_session_token(SECRET, "U1", "T1").expect("token");
        let claims = verify_session_token(SECRET, &token).expect("claims");
        assert_eq!(claims.user_id, "U1");
        assert_eq!(claims.team_id, "T1");
        assert!(claims.exp > Utc::now().timestamp());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = issue_session_token(SECRET, "U1", "T1").expect("token");
        assert!(verify_session_token("other-secret", &token).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let claims = SessionClaims {
            user_id: "U1".to_string(),
            team_id: "T1".to_string(),
            exp: (Utc::now() - Duration::days(1)).timestamp(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .expect("token");
        assert!(verify_session_token(SECRET, &token).is_err());
    }

    #[test]
    fn garbage_token_is_rejected() {
        assert!(verify_session_token(SECRET, "not-a-jwt").is_err());
    }

    #[test]
    fn bearer_extraction() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_bearer_token(&headers), None);

        headers.insert("Authorization", HeaderValue::from_static("Bearer abc123"));
        assert_eq!(extract_bearer_token(&headers), Some("abc123".to_string()));

        headers.insert("Authorization", HeaderValue::from_static("Basic abc123"));
        assert_eq!(extract_bearer_token(&headers), None);
    }

    #[test]
    fn authenticate_requires_a_token() {
        let headers = HeaderMap::new();
        assert!(matches!(
            authenticate(SECRET, &headers),
            Err(AuthError::MissingToken)
        ));
    }
}
