use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use time::OffsetDateTime;

use super::{
    directory::User,
    services::{AuthError, AuthService},
};
use crate::error::ApiError;

/// The authenticated caller, resolved from `Authorization: Bearer <token>`.
pub struct CurrentUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
    AuthService: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = AuthService::from_ref(state);
        let raw = parts
            .headers
            .get(header::AUTHORIZATION)
            .ok_or(AuthError::MissingCredentials)?;
        // present but not visible ASCII is a bad credential, not a missing one
        let value = raw.to_str().map_err(|_| AuthError::InvalidCredentials)?;

        let token = bearer_token(value).ok_or(AuthError::InvalidCredentials)?;
        let user = auth.resolve_caller(token, OffsetDateTime::now_utc()).await?;
        Ok(CurrentUser(user))
    }
}

/// Token part of a `Bearer` credential; scheme match is case-insensitive.
fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}
