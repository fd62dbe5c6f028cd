use anyhow::{Context, Result, bail};
use rand::RngCore;
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;

pub const DEFAULT_ACCESS_TTL_SECS: u64 = 300;
pub const DEFAULT_REFRESH_TTL_SECS: u64 = 86_400;
pub const DEFAULT_JWT_ISSUER: &str = "bugtracker";

// Bug tracker configuration sourced from environment variables.
#[derive(Debug, Clone)]
pub struct BugTrackerConfig {
    pub bind_addr: SocketAddr,
    pub metrics_bind: SocketAddr,
    pub storage: StorageBackend,
    pub postgres: Option<PostgresConfig>,
    pub auth: AuthConfig,
    pub media_root: PathBuf,
    pub bootstrap_admin: Option<AdminSeed>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Postgres,
}

impl std::str::FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "memory" | "in-memory" => Ok(StorageBackend::Memory),
            "postgres" | "postgresql" => Ok(StorageBackend::Postgres),
            other => bail!("unknown storage backend: {other}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub url: String,
    pub max_connections: u32,
    pub connect_timeout_ms: u64,
    pub acquire_timeout_ms: u64,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub issuer: String,
    pub access_ttl_secs: u64,
    pub refresh_ttl_secs: u64,
}

impl AuthConfig {
    /// Config with a random signing secret; tokens do not survive a restart.
    pub fn ephemeral() -> Self {
        Self {
            jwt_secret: random_secret(),
            issuer: DEFAULT_JWT_ISSUER.to_string(),
            access_ttl_secs: DEFAULT_ACCESS_TTL_SECS,
            refresh_ttl_secs: DEFAULT_REFRESH_TTL_SECS,
        }
    }
}

/// Administrator account created at startup when absent.
#[derive(Debug, Clone)]
pub struct AdminSeed {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct BugTrackerConfigOverride {
    bind_addr: Option<String>,
    metrics_bind: Option<String>,
    storage: Option<String>,
    database_url: Option<String>,
    jwt_secret: Option<String>,
    jwt_issuer: Option<String>,
    access_ttl_secs: Option<u64>,
    refresh_ttl_secs: Option<u64>,
    media_root: Option<PathBuf>,
    admin: Option<AdminOverride>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AdminOverride {
    username: String,
    email: String,
    password: String,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(value) => value
            .parse()
            .map_err(|err| anyhow::anyhow!("parse {key}: {err}")),
        Err(_) => Ok(default),
    }
}

fn random_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

impl BugTrackerConfig {
    pub fn from_env() -> Result<Self> {
        let bind_addr = env_or("BUGTRACKER_BIND", "0.0.0.0:8000")
            .parse()
            .with_context(|| "parse BUGTRACKER_BIND")?;
        let metrics_bind = env_or("BUGTRACKER_METRICS_BIND", "0.0.0.0:9100")
            .parse()
            .with_context(|| "parse BUGTRACKER_METRICS_BIND")?;
        let storage = env_or("BUGTRACKER_STORAGE", "memory")
            .parse()
            .with_context(|| "parse BUGTRACKER_STORAGE")?;

        let postgres = match std::env::var("BUGTRACKER_DATABASE_URL")
            .or_else(|_| std::env::var("DATABASE_URL"))
        {
            Ok(url) => Some(PostgresConfig {
                url,
                max_connections: env_parse("BUGTRACKER_PG_MAX_CONNECTIONS", 10)?,
                connect_timeout_ms: env_parse("BUGTRACKER_PG_CONNECT_TIMEOUT_MS", 5_000)?,
                acquire_timeout_ms: env_parse("BUGTRACKER_PG_ACQUIRE_TIMEOUT_MS", 5_000)?,
            }),
            Err(_) => None,
        };

        let jwt_secret = match std::env::var("BUGTRACKER_JWT_SECRET") {
            Ok(secret) if !secret.is_empty() => secret,
            _ => {
                tracing::warn!("BUGTRACKER_JWT_SECRET not set; using a random signing secret");
                random_secret()
            }
        };
        let auth = AuthConfig {
            jwt_secret,
            issuer: env_or("BUGTRACKER_JWT_ISSUER", DEFAULT_JWT_ISSUER),
            access_ttl_secs: env_parse("BUGTRACKER_ACCESS_TTL_SECS", DEFAULT_ACCESS_TTL_SECS)?,
            refresh_ttl_secs: env_parse(
                "BUGTRACKER_REFRESH_TTL_SECS",
                DEFAULT_REFRESH_TTL_SECS,
            )?,
        };

        let bootstrap_admin = match (
            std::env::var("BUGTRACKER_ADMIN_USERNAME"),
            std::env::var("BUGTRACKER_ADMIN_EMAIL"),
            std::env::var("BUGTRACKER_ADMIN_PASSWORD"),
        ) {
            (Ok(username), Ok(email), Ok(password)) => Some(AdminSeed {
                username,
                email,
                password,
            }),
            _ => None,
        };

        Ok(Self {
            bind_addr,
            metrics_bind,
            storage,
            postgres,
            auth,
            media_root: PathBuf::from(env_or("BUGTRACKER_MEDIA_ROOT", "media")),
            bootstrap_admin,
        })
    }

    pub fn from_env_or_yaml() -> Result<Self> {
        let mut config = Self::from_env()?;
        if let Ok(path) = std::env::var("BUGTRACKER_CONFIG") {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("read BUGTRACKER_CONFIG: {path}"))?;
            config.apply_yaml(&contents)?;
        }
        config.validate()?;
        Ok(config)
    }

    fn apply_yaml(&mut self, contents: &str) -> Result<()> {
        let override_cfg: BugTrackerConfigOverride =
            serde_yaml::from_str(contents).with_context(|| "parse bug tracker config yaml")?;
        if let Some(value) = override_cfg.bind_addr {
            self.bind_addr = value.parse().with_context(|| "parse bind_addr")?;
        }
        if let Some(value) = override_cfg.metrics_bind {
            self.metrics_bind = value.parse().with_context(|| "parse metrics_bind")?;
        }
        if let Some(value) = override_cfg.storage {
            self.storage = value.parse().with_context(|| "parse storage")?;
        }
        if let Some(url) = override_cfg.database_url {
            match self.postgres.as_mut() {
                Some(pg) => pg.url = url,
                None => {
                    self.postgres = Some(PostgresConfig {
                        url,
                        max_connections: 10,
                        connect_timeout_ms: 5_000,
                        acquire_timeout_ms: 5_000,
                    })
                }
            }
        }
        if let Some(value) = override_cfg.jwt_secret {
            self.auth.jwt_secret = value;
        }
        if let Some(value) = override_cfg.jwt_issuer {
            self.auth.issuer = value;
        }
        if let Some(value) = override_cfg.access_ttl_secs {
            self.auth.access_ttl_secs = value;
        }
        if let Some(value) = override_cfg.refresh_ttl_secs {
            self.auth.refresh_ttl_secs = value;
        }
        if let Some(value) = override_cfg.media_root {
            self.media_root = value;
        }
        if let Some(admin) = override_cfg.admin {
            self.bootstrap_admin = Some(AdminSeed {
                username: admin.username,
                email: admin.email,
                password: admin.password,
            });
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.auth.access_ttl_secs == 0 || self.auth.refresh_ttl_secs == 0 {
            bail!("token lifetimes must be positive");
        }
        if self.auth.refresh_ttl_secs < self.auth.access_ttl_secs {
            bail!("refresh token lifetime must not be shorter than access token lifetime");
        }
        Ok(())
    }
}
