use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{info, instrument};

use crate::{
    auth::{
        dto::{Credentials, Detail, PublicUser, TokenResponse},
        extractors::CurrentUser,
        services::AuthService,
    },
    error::ApiError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/token", post(login))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

#[instrument(skip(auth, payload), fields(email = %payload.email))]
pub async fn register(
    State(auth): State<AuthService>,
    Json(payload): Json<Credentials>,
) -> Result<(StatusCode, Json<Detail>), ApiError> {
    payload.validate()?;
    auth.register(&payload.email, &payload.password).await?;
    Ok((
        StatusCode::CREATED,
        Json(Detail {
            detail: "User created",
        }),
    ))
}

#[instrument(skip(auth, payload), fields(email = %payload.email))]
pub async fn login(
    State(auth): State<AuthService>,
    Json(payload): Json<Credentials>,
) -> Result<Json<TokenResponse>, ApiError> {
    payload.validate()?;
    let user = auth.authenticate(&payload.email, &payload.password).await?;
    let token = auth.issue_token(&user, OffsetDateTime::now_utc())?;
    info!(user_id = user.id, "user logged in");
    Ok(Json(TokenResponse::bearer(token)))
}

#[instrument(skip_all, fields(user_id = user.id))]
pub async fn get_me(CurrentUser(user): CurrentUser) -> Json<PublicUser> {
    Json(PublicUser {
        id: user.id,
        email: user.email,
    })
}
