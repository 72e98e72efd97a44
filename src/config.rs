// ABOUTME: Configuration file model and loader
// ABOUTME: Describes source/destination instances, credentials, allow-lists, and reconcile knobs

use crate::catalog::ColumnRef;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Roles owned by the managed platform that are never reconciled
pub const DEFAULT_RESERVED_ROLES: &[&str] = &["rdsadmin", "rds_superuser"];

/// A Postgres role the tool may log in as
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct User {
    pub name: String,
    #[serde(default)]
    pub pw: Option<String>,
}

/// One Postgres instance taking part in the migration
#[derive(Debug, Clone, Deserialize)]
pub struct DbConfig {
    pub host: String,
    #[serde(default)]
    pub ip: Option<String>,
    pub db: String,
    pub port: String,
    pub root_user: User,
    pub owner_user: User,
    #[serde(default)]
    pub pglogical_user: Option<User>,
}

impl DbConfig {
    /// Address to dial: the IP when one is configured, the hostname otherwise
    pub fn address(&self) -> &str {
        self.ip
            .as_deref()
            .filter(|ip| !ip.trim().is_empty())
            .unwrap_or(&self.host)
    }

    pub fn port_number(&self) -> Result<u16> {
        self.port
            .trim()
            .parse::<u16>()
            .with_context(|| format!("Invalid port '{}' for host {}", self.port, self.host))
    }

    /// Connection settings for the privileged root user
    pub fn root_pg_config(&self) -> Result<tokio_postgres::Config> {
        self.pg_config(&self.root_user)
    }

    /// Connection settings for the owner user
    pub fn owner_pg_config(&self) -> Result<tokio_postgres::Config> {
        self.pg_config(&self.owner_user)
    }

    fn pg_config(&self, user: &User) -> Result<tokio_postgres::Config> {
        let mut config = tokio_postgres::Config::new();
        config
            .host(self.address())
            .port(self.port_number()?)
            .dbname(&self.db)
            .user(&user.name)
            .application_name("pg-compare");
        if let Some(pw) = &user.pw {
            config.password(pw);
        }
        Ok(config)
    }

    fn validate(&self, side: &str) -> Result<()> {
        for (field, value) in [("host", &self.host), ("db", &self.db), ("port", &self.port)] {
            if value.trim().is_empty() {
                bail!("{}.{} cannot be empty", side, field);
            }
        }
        self.port_number()?;

        for (field, user) in [("root_user", &self.root_user), ("owner_user", &self.owner_user)] {
            if user.name.trim().is_empty() {
                bail!("{}.{}.name cannot be empty", side, field);
            }
            match &user.pw {
                Some(pw) if !pw.is_empty() => {}
                _ => bail!("{}.{} must have a password", side, field),
            }
        }
        Ok(())
    }
}

/// Top-level configuration for a compare/prepare run
#[derive(Debug, Clone, Deserialize)]
pub struct PgConfig {
    #[serde(default)]
    pub db: String,
    #[serde(default)]
    pub dc: String,
    pub src: DbConfig,
    pub dst: DbConfig,
    /// Allow-list of table names; empty means every table participates
    #[serde(default)]
    pub tables: Vec<String>,
    /// Allow-list of sequence names; empty means every sequence participates
    #[serde(default)]
    pub sequences: Vec<String>,
    #[serde(default = "default_reserved_roles")]
    pub reserved_roles: Vec<String>,
    /// Column every created sequence is `OWNED BY`; falls back to the source catalog
    #[serde(default)]
    pub sequence_owned_by: Option<ColumnRef>,
    /// Schemas granted to a freshly created owner role
    #[serde(default = "default_bootstrap_schemas")]
    pub bootstrap_schemas: Vec<String>,
    #[serde(default = "default_lock_timeout")]
    pub lock_timeout: String,
    #[serde(default = "default_row_count_timeout")]
    pub row_count_timeout: String,
    /// Part of a scheduled workflow; enables missing-sequence creation
    #[serde(default)]
    pub scheduled: bool,
}

fn default_reserved_roles() -> Vec<String> {
    DEFAULT_RESERVED_ROLES.iter().map(|r| r.to_string()).collect()
}

fn default_bootstrap_schemas() -> Vec<String> {
    vec!["pglogical".to_string()]
}

fn default_lock_timeout() -> String {
    "2s".to_string()
}

fn default_row_count_timeout() -> String {
    "10min".to_string()
}

impl PgConfig {
    /// Parse a config document; TOML when `is_toml`, JSON otherwise
    pub fn parse(content: &str, is_toml: bool) -> Result<Self> {
        let config: PgConfig = if is_toml {
            toml::from_str(content).context("Failed to parse TOML config")?
        } else {
            serde_json::from_str(content).context("Failed to parse JSON config")?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.src.validate("src")?;
        self.dst.validate("dst")?;
        if self.lock_timeout.trim().is_empty() {
            bail!("lock_timeout cannot be empty");
        }
        if self.row_count_timeout.trim().is_empty() {
            bail!("row_count_timeout cannot be empty");
        }
        Ok(())
    }

    /// The role every reconciled source object ends up owned by
    pub fn required_owner(&self) -> &str {
        &self.src.owner_user.name
    }
}

/// Load and validate a config file
///
/// Files ending in `.toml` are read as TOML; anything else is JSON, which is
/// what the migration tooling writes.
pub fn load_config(path: impl AsRef<Path>) -> Result<PgConfig> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let is_toml = path.extension().is_some_and(|ext| ext == "toml");
    let config = PgConfig::parse(&content, is_toml)
        .with_context(|| format!("Invalid config file {}", path.display()))?;
    tracing::info!("Config loaded from {}", path.display());
    Ok(config)
}
