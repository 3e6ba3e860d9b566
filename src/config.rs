use anyhow::Context;
use argon2::Params;
use jsonwebtoken::Algorithm;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub algorithm: String,
    pub ttl_minutes: i64,
}

impl JwtConfig {
    pub const DEFAULT_TTL_MINUTES: i64 = 30;
    pub const MAX_TTL_MINUTES: i64 = 60 * 24 * 365;

    /// Rejects settings that would only fail later, on a login.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.algorithm()?;
        if !(1..=Self::MAX_TTL_MINUTES).contains(&self.ttl_minutes) {
            anyhow::bail!(
                "JWT_TTL_MINUTES must be between 1 and {}, got {}",
                Self::MAX_TTL_MINUTES,
                self.ttl_minutes
            );
        }
        Ok(())
    }

    /// Parses the configured algorithm, accepting only the HMAC family.
    pub fn algorithm(&self) -> anyhow::Result<Algorithm> {
        let alg: Algorithm = self
            .algorithm
            .parse()
            .with_context(|| format!("unknown JWT algorithm {}", self.algorithm))?;
        match alg {
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => Ok(alg),
            other => anyhow::bail!("JWT algorithm {:?} is not a symmetric HMAC algorithm", other),
        }
    }
}

/// Argon2 cost parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct PasswordConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub jwt: JwtConfig,
    pub password: PasswordConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database_url = var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let jwt = JwtConfig {
            secret: var("JWT_SECRET").context("JWT_SECRET is not set")?,
            algorithm: var("JWT_ALGORITHM").unwrap_or_else(|| "HS256".into()),
            ttl_minutes: parse_var(&var, "JWT_TTL_MINUTES")?
                .unwrap_or(JwtConfig::DEFAULT_TTL_MINUTES),
        };
        // fail at startup rather than on the first login
        jwt.validate()?;

        let defaults = PasswordConfig::default();
        let password = PasswordConfig {
            memory_kib: parse_var(&var, "ARGON2_MEMORY_KIB")?.unwrap_or(defaults.memory_kib),
            iterations: parse_var(&var, "ARGON2_ITERATIONS")?.unwrap_or(defaults.iterations),
            parallelism: parse_var(&var, "ARGON2_PARALLELISM")?.unwrap_or(defaults.parallelism),
        };

        Ok(Self {
            host: var("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_var(&var, "APP_PORT")?.unwrap_or(8080),
            database_url,
            jwt,
            password,
        })
    }
}

/// `None` when unset; an error when set but unparseable.
fn parse_var<T>(var: impl Fn(&str) -> Option<String>, key: &str) -> anyhow::Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    var(key)
        .map(|v| {
            v.trim()
                .parse::<T>()
                .with_context(|| format!("{} has an invalid value {:?}", key, v))
        })
        .transpose()
}
