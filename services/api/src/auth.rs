//! HS256 bearer tokens carrying the caller's user id and role.

use std::time::Duration;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use listing_hub::domain::{Caller, Role, UserId};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: Uuid,
    role: Role,
    iat: i64,
    exp: i64,
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum AuthError {
    #[error("missing bearer token")]
    Missing,
    #[error("malformed authorization header")]
    Malformed,
    #[error("invalid token: {0}")]
    Invalid(#[source] jsonwebtoken::errors::Error),
    #[error("failed to sign token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
    #[error("token authority is not configured")]
    Unconfigured,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match self {
            AuthError::Missing | AuthError::Malformed | AuthError::Invalid(_) => {
                StatusCode::UNAUTHORIZED
            }
            AuthError::Signing(_) | AuthError::Unconfigured => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Issues and verifies tokens with a secret injected from configuration.
#[derive(Clone)]
pub(crate) struct TokenAuthority {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenAuthority {
    pub(crate) fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
            ttl,
        }
    }

    pub(crate) fn issue(&self, caller: &Caller) -> Result<String, AuthError> {
        let now = Utc::now().timestamp();
        let ttl = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        let claims = Claims {
            sub: caller.user_id.0,
            role: caller.role,
            iat: now,
            exp: now.saturating_add(ttl),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(AuthError::Signing)
    }

    pub(crate) fn verify(&self, token: &str) -> Result<Caller, AuthError> {
        let data =
            decode::<Claims>(token, &self.decoding, &self.validation).map_err(AuthError::Invalid)?;
        Ok(Caller::new(UserId(data.claims.sub), data.claims.role))
    }
}

/// Extractor resolving the bearer token into a [`Caller`].
pub(crate) struct Authenticated(pub(crate) Caller);

#[async_trait]
impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let authority = parts
            .extensions
            .get::<TokenAuthority>()
            .ok_or(AuthError::Unconfigured)?;
        let token = extract_bearer(&parts.headers)?;
        authority.verify(token).map(Authenticated)
    }
}

fn extract_bearer(headers: &HeaderMap) -> Result<&str, AuthError> {
    let header = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::Missing)?;

    let header = header.to_str().map_err(|_| AuthError::Malformed)?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or(AuthError::Malformed)?
        .trim();
    if token.is_empty() {
        return Err(AuthError::Missing);
    }

    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn issued_token_round_trips_identity() {
        let authority = TokenAuthority::new("test-secret", Duration::from_secs(60));
        let caller = Caller::moderator(UserId::new_random());

        let token = authority.issue(&caller).expect("token signs");
        assert_eq!(authority.verify(&token).expect("token verifies"), caller);
    }

    #[test]
    fn foreign_secret_is_rejected() {
        let issuer = TokenAuthority::new("one-secret", Duration::from_secs(60));
        let verifier = TokenAuthority::new("other-secret", Duration::from_secs(60));
        let token = issuer
            .issue(&Caller::client(UserId::new_random()))
            .expect("token signs");

        assert!(matches!(verifier.verify(&token), Err(AuthError::Invalid(_))));
    }

    #[test]
    fn bearer_header_must_be_well_formed() {
        let mut headers = HeaderMap::new();
        assert!(matches!(extract_bearer(&headers), Err(AuthError::Missing)));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(matches!(extract_bearer(&headers), Err(AuthError::Malformed)));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer  abc "));
        assert_eq!(extract_bearer(&headers).expect("token present"), "abc");
    }
}
