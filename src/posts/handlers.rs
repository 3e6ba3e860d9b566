use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{debug, info, instrument};

use super::{
    dto::{non_blank, CreateCommentRequest, CreatePostRequest, PostWithComments},
    repo::{Comment, Post},
};
use crate::{auth::extractors::CurrentUser, error::ApiError, state::AppState};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/post", get(list_posts))
        .route("/post/:id", get(get_post_with_comments))
        .route("/post/:id/comment", get(list_comments))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/post", post(create_post))
        .route("/comment", post(create_comment))
}

#[instrument(skip_all, fields(user_id = user.id))]
pub async fn create_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<Post>), ApiError> {
    let body = non_blank(&payload.body)?;
    let post = Post::create(&state.db, user.id, body).await?;
    info!(post_id = post.id, "post created");
    Ok((StatusCode::CREATED, Json(post)))
}

#[instrument(skip(state))]
pub async fn list_posts(State(state): State<AppState>) -> Result<Json<Vec<Post>>, ApiError> {
    Ok(Json(Post::list(&state.db).await?))
}

#[instrument(skip_all, fields(user_id = user.id, post_id = payload.post_id))]
pub async fn create_comment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<Comment>), ApiError> {
    let body = non_blank(&payload.body)?;
    if Post::find(&state.db, payload.post_id).await?.is_none() {
        debug!("comment on missing post");
        return Err(ApiError::NotFound("Post not found"));
    }
    let comment = Comment::create(&state.db, user.id, payload.post_id, body).await?;
    info!(comment_id = comment.id, "comment created");
    Ok((StatusCode::CREATED, Json(comment)))
}

#[instrument(skip(state))]
pub async fn list_comments(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<Comment>>, ApiError> {
    Ok(Json(Comment::list_for_post(&state.db, id).await?))
}

#[instrument(skip(state))]
pub async fn get_post_with_comments(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<PostWithComments>, ApiError> {
    let post = Post::find(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("Post not found"))?;
    let comments = Comment::list_for_post(&state.db, id).await?;
    Ok(Json(PostWithComments { post, comments }))
}
