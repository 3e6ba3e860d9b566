use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Post {
    pub id: i64,
    pub body: String,
    pub user_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Comment {
    pub id: i64,
    pub body: String,
    pub post_id: i64,
    pub user_id: i64,
}

impl Post {
    pub async fn create(db: &PgPool, user_id: i64, body: &str) -> sqlx::Result<Post> {
        sqlx::query_as::<_, Post>(
            r#"
            INSERT INTO posts (body, user_id)
            VALUES ($1, $2)
            RETURNING id, body, user_id
            "#,
        )
        .bind(body)
        .bind(user_id)
        .fetch_one(db)
        .await
    }

    pub async fn list(db: &PgPool) -> sqlx::Result<Vec<Post>> {
        sqlx::query_as::<_, Post>(
            r#"
            SELECT id, body, user_id
            FROM posts
            ORDER BY id
            "#,
        )
        .fetch_all(db)
        .await
    }

    pub async fn find(db: &PgPool, id: i64) -> sqlx::Result<Option<Post>> {
        sqlx::query_as::<_, Post>(
            r#"
            SELECT id, body, user_id
            FROM posts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await
    }
}

impl Comment {
    pub async fn create(
        db: &PgPool,
        user_id: i64,
        post_id: i64,
        body: &str,
    ) -> sqlx::Result<Comment> {
        sqlx::query_as::<_, Comment>(
            r#"
            INSERT INTO comments (body, post_id, user_id)
            VALUES ($1, $2, $3)
            RETURNING id, body, post_id, user_id
            "#,
        )
        .bind(body)
        .bind(post_id)
        .bind(user_id)
        .fetch_one(db)
        .await
    }

    pub async fn list_for_post(db: &PgPool, post_id: i64) -> sqlx::Result<Vec<Comment>> {
        sqlx::query_as::<_, Comment>(
            r#"
            SELECT id, body, post_id, user_id
            FROM comments
            WHERE post_id = $1
            ORDER BY id
            "#,
        )
        .bind(post_id)
        .fetch_all(db)
        .await
    }
}
