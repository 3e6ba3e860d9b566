use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;

/// User record in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 PHC string, not exposed in JSON
}

/// A registration ready to be persisted. Carries the hash, never the plaintext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("email already registered")]
    EmailTaken,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Where user records live. Emails are matched exactly; callers normalize.
#[async_trait]
pub trait UserDirectory: Send + Sync + 'static {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DirectoryError>;

    /// Assigns the id. Fails with `EmailTaken` instead of overwriting.
    async fn insert(&self, new_user: NewUser) -> Result<User, DirectoryError>;
}
