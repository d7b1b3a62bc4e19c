//! Request authentication.
//!
//! Tokens are HS256 JWTs whose `sub` is the numeric user id. They arrive in
//! the `auth-token` cookie or as `Authorization: Bearer <token>`.

use std::net::{IpAddr, SocketAddr};

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{HeaderMap, header, request::Parts},
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use recipebox::{RecipeStore, UserId};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::AppError;

pub const AUTH_COOKIE: &str = "auth-token";

/// Turns a presented credential into a user id.
pub trait TokenVerifier: Send + Sync + 'static {
    fn verify(&self, token: &str) -> Option<UserId>;
}

/// Payload stored in the token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id, as a decimal string
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }
}

impl TokenVerifier for JwtVerifier {
    fn verify(&self, token: &str) -> Option<UserId> {
        match decode::<Claims>(token, &self.key, &self.validation) {
            Ok(data) => data.claims.sub.parse().ok(),
            Err(err) => {
                tracing::debug!(error = %err, "rejected token");
                None
            }
        }
    }
}

/// Pull the raw token out of the cookie or the Authorization header.
pub fn extract_token(headers: &HeaderMap) -> Option<&str> {
    let from_cookie = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == AUTH_COOKIE)
        .map(|(_, value)| value.trim())
        .filter(|t| !t.is_empty());

    from_cookie.or_else(|| {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
    })
}

fn authenticate<S>(parts: &Parts, state: &AppState<S>) -> Option<UserId> {
    extract_token(&parts.headers).and_then(|token| state.verifier.verify(token))
}

/// A request from a signed-in user. Rejects with 401 otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser(pub UserId);

impl<S: RecipeStore> FromRequestParts<AppState<S>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<S>,
    ) -> Result<Self, Self::Rejection> {
        authenticate(parts, state)
            .map(AuthUser)
            .ok_or(AppError::Store(recipebox::Error::Unauthenticated))
    }
}

/// The caller if a valid credential came along; anonymous otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaybeUser(pub Option<UserId>);

impl<S: RecipeStore> FromRequestParts<AppState<S>> for MaybeUser {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<S>,
    ) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(authenticate(parts, state)))
    }
}

/// Where a request came from, for view accounting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientMeta {
    pub ip: Option<IpAddr>,
    pub user_agent: Option<String>,
}

impl<S: Send + Sync> FromRequestParts<S> for ClientMeta {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // First hop of X-Forwarded-For wins over the socket peer.
        let forwarded = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|ip| ip.trim().parse().ok());
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        let user_agent = parts
            .headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        Ok(ClientMeta {
            ip: forwarded.or(peer),
            user_agent,
        })
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;
    use jsonwebtoken::{EncodingKey, Header, encode};

    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn token(sub: &str, exp: u64, secret: &str) -> String {
        let claims = Claims {
            sub: sub.to_owned(),
            exp,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn far_future() -> u64 {
        (chrono::Utc::now().timestamp() + 3600) as u64
    }

    #[test]
    fn verifies_valid_token() {
        let verifier = JwtVerifier::new(SECRET);
        assert_eq!(verifier.verify(&token("17", far_future(), SECRET)), Some(17));
    }

    #[test]
    fn rejects_bad_tokens() {
        let verifier = JwtVerifier::new(SECRET);
        let other = "ffffffffffffffffffffffffffffffff";
        assert_eq!(verifier.verify(&token("17", far_future(), other)), None);
        assert_eq!(verifier.verify(&token("17", 1_000, SECRET)), None);
        assert_eq!(verifier.verify(&token("ann", far_future(), SECRET)), None);
        assert_eq!(verifier.verify("not-a-jwt"), None);
    }

    #[test]
    fn token_from_cookie_or_bearer() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(extract_token(&headers), Some("abc"));

        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; auth-token=xyz"),
        );
        assert_eq!(extract_token(&headers), Some("xyz"));

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(extract_token(&headers), None);
    }

    #[test]
    fn empty_cookie_falls_back_to_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("auth-token=; theme=dark"));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(extract_token(&headers), Some("abc"));

        headers.insert(header::COOKIE, HeaderValue::from_static("auth-token=  "));
        assert_eq!(extract_token(&headers), Some("abc"));

        headers.remove(header::AUTHORIZATION);
        assert_eq!(extract_token(&headers), None);
    }
}
