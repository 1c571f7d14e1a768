use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{header::AUTHORIZATION, request::Parts, HeaderMap};

use crate::claims::UserClaims;
use crate::error::AuthError;

/// Claims admitted by the role gate for the current request.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub claims: UserClaims,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<UserClaims>()
            .cloned()
            .map(|claims| Self { claims })
            .ok_or_else(|| AuthError::Unauthorized("user not authenticated".into()))
    }
}

/// Bearer credential from the Authorization header, with the `Bearer `
/// prefix stripped. Absent, unreadable or blank values yield `None`.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    let token = raw.strip_prefix("Bearer ").unwrap_or(raw).trim();
    if token.is_empty() || token == "Bearer" {
        None
    } else {
        Some(token.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn bearer_token_strips_prefix() {
        assert_eq!(
            bearer_token(&headers("Bearer abc.def.ghi")).as_deref(),
            Some("abc.def.ghi")
        );
    }

    #[test]
    fn bearer_token_treats_blank_as_missing() {
        assert!(bearer_token(&HeaderMap::new()).is_none());
        assert!(bearer_token(&headers("Bearer    ")).is_none());
        assert!(bearer_token(&headers("")).is_none());
    }

    #[test]
    fn unprefixed_value_is_passed_through() {
        assert_eq!(bearer_token(&headers("abc.def")).as_deref(), Some("abc.def"));
    }
}
