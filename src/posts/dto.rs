use serde::{Deserialize, Serialize};

use super::repo::{Comment, Post};
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub body: String,
    pub post_id: i64,
}

#[derive(Debug, Serialize)]
pub struct PostWithComments {
    pub post: Post,
    pub comments: Vec<Comment>,
}

pub(crate) fn non_blank(body: &str) -> Result<&str, ApiError> {
    let body = body.trim();
    if body.is_empty() {
        return Err(ApiError::BadRequest("Body must not be empty".into()));
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_blank_trims_and_rejects_empty() {
        assert_eq!(non_blank("  hello ").unwrap(), "hello");
        assert!(matches!(non_blank(" \n "), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn post_with_comments_serialization() {
        let value = serde_json::to_value(PostWithComments {
            post: Post {
                id: 1,
                body: "first".into(),
                user_id: 7,
            },
            comments: vec![Comment {
                id: 3,
                body: "reply".into(),
                post_id: 1,
                user_id: 8,
            }],
        })
        .unwrap();

        assert_eq!(value["post"]["body"], "first");
        assert_eq!(value["post"]["user_id"], 7);
        assert_eq!(value["comments"][0]["post_id"], 1);
        assert_eq!(value["comments"][0]["user_id"], 8);
    }

    #[test]
    fn create_comment_request_requires_post_id() {
        let err = serde_json::from_str::<CreateCommentRequest>(r#"{"body":"x"}"#);
        assert!(err.is_err());
    }
}
