use std::sync::Arc;

use anyhow::Context;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use super::directory::{DirectoryError, NewUser, User, UserDirectory};
use super::jwt::{TokenCodec, TokenError};
use super::password::{PasswordError, PasswordHasher};
use crate::config::{JwtConfig, PasswordConfig};

/// Errors leaving the auth core. Token-level errors are always translated.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Could not validate credentials")]
    InvalidCredentials,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Not authenticated")]
    MissingCredentials,

    #[error("A user with that email already exists")]
    Conflict,

    #[error("user directory failure: {0}")]
    Directory(DirectoryError),

    #[error("password hashing failure: {0}")]
    Password(#[from] PasswordError),

    #[error("token signing failure: {0}")]
    Signing(String),
}

impl From<DirectoryError> for AuthError {
    fn from(e: DirectoryError) -> Self {
        match e {
            DirectoryError::EmailTaken => AuthError::Conflict,
            other => AuthError::Directory(other),
        }
    }
}

/// Emails are compared after trimming and lowercasing.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Clone)]
pub struct AuthService {
    hasher: PasswordHasher,
    codec: TokenCodec,
    directory: Arc<dyn UserDirectory>,
    ttl_minutes: i64,
    // verified against when the email is unknown, so both login failures cost the same
    dummy_hash: Arc<str>,
}

impl AuthService {
    pub fn new(
        jwt: &JwtConfig,
        password: &PasswordConfig,
        directory: Arc<dyn UserDirectory>,
    ) -> anyhow::Result<Self> {
        let hasher = PasswordHasher::new(password).context("build password hasher")?;
        let codec = TokenCodec::from_config(jwt).context("build token codec")?;
        let dummy_hash = hasher
            .hash("storeapi-dummy-password")
            .context("hash dummy password")?;
        Ok(Self {
            hasher,
            codec,
            directory,
            ttl_minutes: jwt.ttl_minutes,
            dummy_hash: dummy_hash.into(),
        })
    }

    /// Checks the email is free and hashes the password. Nothing is stored.
    pub async fn prepare_registration(
        &self,
        email: &str,
        plain_password: &str,
    ) -> Result<NewUser, AuthError> {
        let email = normalize_email(email);
        if self.directory.find_by_email(&email).await?.is_some() {
            warn!(email = %email, "email already registered");
            return Err(AuthError::Conflict);
        }
        let password_hash = self.hasher.hash(plain_password)?;
        Ok(NewUser {
            email,
            password_hash,
        })
    }

    /// `prepare_registration` followed by the insert. A concurrent registration
    /// that wins the race still surfaces as `Conflict`.
    pub async fn register(&self, email: &str, plain_password: &str) -> Result<User, AuthError> {
        let new_user = self.prepare_registration(email, plain_password).await?;
        let user = self.directory.insert(new_user).await?;
        info!(user_id = user.id, email = %user.email, "user registered");
        Ok(user)
    }

    pub async fn authenticate(&self, email: &str, plain_password: &str) -> Result<User, AuthError> {
        let email = normalize_email(email);
        debug!(email = %email, "authenticating user");

        let Some(user) = self.directory.find_by_email(&email).await? else {
            let _ = self.hasher.verify(plain_password, &self.dummy_hash);
            warn!(email = %email, "login unknown email");
            return Err(AuthError::InvalidCredentials);
        };

        if !self.hasher.verify(plain_password, &user.password_hash) {
            warn!(email = %email, user_id = user.id, "login invalid password");
            return Err(AuthError::InvalidCredentials);
        }

        Ok(user)
    }

    pub fn issue_token(&self, user: &User, now: OffsetDateTime) -> Result<String, AuthError> {
        self.codec
            .encode(&user.email, now, self.ttl_minutes)
            .map_err(|e| AuthError::Signing(e.to_string()))
    }

    /// The guard in front of protected operations.
    pub async fn resolve_caller(&self, token: &str, now: OffsetDateTime) -> Result<User, AuthError> {
        let claims = self.codec.decode(token, now).map_err(|e| match e {
            TokenError::Expired => AuthError::TokenExpired,
            TokenError::Invalid | TokenError::Encoding(_) => AuthError::InvalidCredentials,
        })?;

        if claims.sub.is_empty() {
            return Err(AuthError::InvalidCredentials);
        }

        match self.directory.find_by_email(&claims.sub).await? {
            Some(user) => Ok(user),
            None => {
                warn!(sub = %claims.sub, "token subject has no user");
                Err(AuthError::InvalidCredentials)
            }
        }
    }
}

#[cfg(test)]
pub(crate) fn test_jwt() -> JwtConfig {
    JwtConfig {
        secret: "test-secret-at-least-32-bytes-long!!".into(),
        algorithm: "HS256".into(),
        ttl_minutes: JwtConfig::DEFAULT_TTL_MINUTES,
    }
}

#[cfg(test)]
pub(crate) fn test_service_over(directory: Arc<dyn UserDirectory>) -> AuthService {
    AuthService::new(&test_jwt(), &super::password::fast_config(), directory)
        .expect("auth service")
}

#[cfg(test)]
pub(crate) fn test_service() -> (AuthService, Arc<super::directory::memory::InMemoryUserDirectory>) {
    let directory = Arc::new(super::directory::memory::InMemoryUserDirectory::default());
    (test_service_over(directory.clone()), directory)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(ts: i64) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(ts).unwrap()
    }

    #[tokio::test]
    async fn register_stores_one_hashed_record() {
        let (service, directory) = test_service();
        let user = service.register("a@x.com", "secret123").await.unwrap();

        assert_eq!(directory.len(), 1);
        assert_eq!(user.email, "a@x.com");
        assert_ne!(user.password_hash, "secret123");
        assert!(!user.password_hash.contains("secret123"));

        let found = service.authenticate("a@x.com", "secret123").await.unwrap();
        assert_eq!(found, user);

        let err = service.authenticate("a@x.com", "wrong").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn prepare_registration_returns_hash_not_plaintext() {
        let (service, directory) = test_service();
        let new_user = service
            .prepare_registration("  A@X.com ", "secret123")
            .await
            .unwrap();
        assert_eq!(new_user.email, "a@x.com");
        assert!(new_user.password_hash.starts_with("$argon2id$"));
        assert_eq!(directory.len(), 0);
    }

    #[tokio::test]
    async fn duplicate_registration_conflicts_without_overwrite() {
        let (service, directory) = test_service();
        let first = service.register("a@x.com", "secret123").await.unwrap();

        let err = service.register("a@x.com", "other-pass").await.unwrap_err();
        assert!(matches!(err, AuthError::Conflict));
        assert_eq!(err.to_string(), "A user with that email already exists");

        assert_eq!(directory.len(), 1);
        let stored = directory.find_by_email("a@x.com").await.unwrap().unwrap();
        assert_eq!(stored, first);
        assert!(service.authenticate("a@x.com", "secret123").await.is_ok());
        assert!(service.authenticate("a@x.com", "other-pass").await.is_err());
    }

    #[tokio::test]
    async fn insert_race_maps_to_conflict() {
        let (service, directory) = test_service();
        // both requests pass the pre-check before either inserts
        let first = service.prepare_registration("a@x.com", "one").await.unwrap();
        let second = service.prepare_registration("a@x.com", "two").await.unwrap();
        directory.insert(first).await.unwrap();
        let err: AuthError = directory.insert(second).await.unwrap_err().into();
        assert!(matches!(err, AuthError::Conflict));
    }

    #[tokio::test]
    async fn unknown_email_and_wrong_password_are_indistinguishable() {
        let (service, _) = test_service();
        service.register("a@x.com", "secret123").await.unwrap();

        let unknown = service
            .authenticate("nobody@x.com", "secret123")
            .await
            .unwrap_err();
        let wrong = service.authenticate("a@x.com", "nope").await.unwrap_err();

        assert!(matches!(unknown, AuthError::InvalidCredentials));
        assert!(matches!(wrong, AuthError::InvalidCredentials));
        assert_eq!(unknown.to_string(), wrong.to_string());
    }

    #[tokio::test]
    async fn email_matching_is_case_insensitive() {
        let (service, _) = test_service();
        service.register("Alice@Example.com", "secret123").await.unwrap();

        let user = service
            .authenticate("alice@example.COM ", "secret123")
            .await
            .unwrap();
        assert_eq!(user.email, "alice@example.com");

        let err = service
            .register("ALICE@example.com", "secret123")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Conflict));
    }

    #[tokio::test]
    async fn resolve_caller_within_ttl_and_after() {
        let (service, _) = test_service();
        let user = service.register("a@x.com", "secret123").await.unwrap();
        let token = service.issue_token(&user, at(1000)).unwrap();

        let caller = service
            .resolve_caller(&token, at(1000 + 1799))
            .await
            .unwrap();
        assert_eq!(caller, user);

        let err = service
            .resolve_caller(&token, at(1000 + 1801))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::TokenExpired));
        assert_eq!(err.to_string(), "Token has expired");
    }

    #[tokio::test]
    async fn resolve_caller_rejects_garbage() {
        let (service, _) = test_service();
        let err = service
            .resolve_caller("invalid token", at(1000))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
        assert_eq!(err.to_string(), "Could not validate credentials");
    }

    #[tokio::test]
    async fn resolve_caller_rejects_unknown_subject() {
        let (service, _) = test_service();
        let ghost = User {
            id: 42,
            email: "ghost@x.com".into(),
            password_hash: String::new(),
        };
        let token = service.issue_token(&ghost, at(1000)).unwrap();
        let err = service.resolve_caller(&token, at(1001)).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn resolve_caller_rejects_empty_subject() {
        let (service, _) = test_service();
        let nobody = User {
            id: 1,
            email: String::new(),
            password_hash: String::new(),
        };
        let token = service.issue_token(&nobody, at(1000)).unwrap();
        let err = service.resolve_caller(&token, at(1001)).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn resolve_caller_rejects_token_from_other_secret() {
        let (service, _) = test_service();
        let user = service.register("a@x.com", "secret123").await.unwrap();
        let foreign = TokenCodec::new(
            b"some-other-secret-32-bytes-long!!!!",
            jsonwebtoken::Algorithm::HS256,
        )
        .encode(&user.email, at(1000), 30)
        .unwrap();
        let err = service.resolve_caller(&foreign, at(1001)).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[test]
    fn normalize_email_trims_and_lowercases() {
        assert_eq!(normalize_email("  Foo@Bar.COM\n"), "foo@bar.com");
    }
}
