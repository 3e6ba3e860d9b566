use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::auth::services::AuthError;

/// Everything a handler can fail with. Rendered as `{"detail": "..."}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(&'static str),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

const INTERNAL: &str = "Internal server error";

impl ApiError {
    fn status_and_detail(&self) -> (StatusCode, String) {
        match self {
            ApiError::Auth(e) => match e {
                AuthError::InvalidCredentials
                | AuthError::TokenExpired
                | AuthError::MissingCredentials => (StatusCode::UNAUTHORIZED, e.to_string()),
                AuthError::Conflict => (StatusCode::BAD_REQUEST, e.to_string()),
                AuthError::Directory(_) | AuthError::Password(_) | AuthError::Signing(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL.into())
                }
            },
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::NotFound(what) => (StatusCode::NOT_FOUND, (*what).into()),
            ApiError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = self.status_and_detail();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }

        let mut res = (status, Json(json!({ "detail": detail }))).into_response();
        if status == StatusCode::UNAUTHORIZED {
            res.headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::directory::DirectoryError;

    #[test]
    fn auth_errors_map_to_boundary_shape() {
        let cases = [
            (AuthError::InvalidCredentials, 401, "Could not validate credentials"),
            (AuthError::TokenExpired, 401, "Token has expired"),
            (AuthError::MissingCredentials, 401, "Not authenticated"),
            (AuthError::Conflict, 400, "A user with that email already exists"),
        ];
        for (err, status, detail) in cases {
            let (s, d) = ApiError::from(err).status_and_detail();
            assert_eq!(s.as_u16(), status);
            assert_eq!(d, detail);
        }
    }

    #[test]
    fn internal_causes_are_hidden() {
        let err = ApiError::from(AuthError::Directory(DirectoryError::Database(
            sqlx::Error::PoolTimedOut,
        )));
        let (s, d) = err.status_and_detail();
        assert_eq!(s, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(d, "Internal server error");
    }

    #[test]
    fn unauthorized_responses_carry_bearer_challenge() {
        let res = ApiError::from(AuthError::TokenExpired).into_response();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(res.headers()[header::WWW_AUTHENTICATE], "Bearer");

        let res = ApiError::NotFound("Post not found").into_response();
        assert!(res.headers().get(header::WWW_AUTHENTICATE).is_none());
    }
}
