use axum::{
    extract::{FromRequestParts, Query},
    http::request::Parts,
};
use serde::Deserialize;

use crate::auth::jwt;
use crate::config::Config;
use crate::error::AppError;

/// Authenticated participant, taken from `Authorization: Bearer <jwt>` or,
/// for WebSocket upgrades where browsers cannot set headers, `?token=<jwt>`.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: String,
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let config = parts
            .extensions
            .get::<Config>()
            .ok_or(AppError::Internal("Missing config".into()))?
            .clone();

        let token = bearer_token(parts)
            .or_else(|| query_token(parts))
            .ok_or(AppError::Unauthorized)?;

        let claims = jwt::verify_token(&token, &config.jwt_secret).ok_or(AppError::Unauthorized)?;
        if claims.sub.is_empty() {
            return Err(AppError::Unauthorized);
        }

        Ok(AuthUser { id: claims.sub })
    }
}

fn bearer_token(parts: &Parts) -> Option<String> {
    let header = parts.headers.get("authorization")?.to_str().ok()?;
    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .map(str::to_string)
}

#[derive(Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

fn query_token(parts: &Parts) -> Option<String> {
    Query::<TokenQuery>::try_from_uri(&parts.uri)
        .ok()
        .and_then(|Query(query)| query.token)
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(uri: &str) -> Parts {
        Request::builder().uri(uri).body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_query_token_is_decoded() {
        let parts = parts("/ws/games/12345?mode=play&token=a%2Bb.c%3D");
        assert_eq!(query_token(&parts).as_deref(), Some("a+b.c="));
    }

    #[test]
    fn test_query_token_missing_or_empty() {
        assert_eq!(query_token(&parts("/ws/games/12345")), None);
        assert_eq!(query_token(&parts("/ws/games/12345?token=")), None);
        assert_eq!(query_token(&parts("/ws/games/12345?other=1")), None);
    }

    #[test]
    fn test_header_and_query_tokens_are_read() {
        let mut parts = parts("/api/games?token=from-query");
        parts
            .headers
            .insert("authorization", "Bearer from-header".parse().unwrap());
        assert_eq!(bearer_token(&parts).as_deref(), Some("from-header"));
        assert_eq!(query_token(&parts).as_deref(), Some("from-query"));
    }
}
