//! Configuration management for the RapidX site service
//!
//! Configuration is layered: built-in defaults, then an optional TOML file,
//! then `RAPIDX__`-prefixed environment variables
//! (e.g. `RAPIDX__AUTH__MAX_ATTEMPTS=3`, `RAPIDX__CREDENTIAL__SECRET=...`).

use crate::auth::AuthPolicy;
use crate::error::{Result, SiteError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use url::Url;

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "RAPIDX";

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Network configuration
    pub network: NetworkConfig,

    /// Attempt/lockout/session policy for the admin dashboard
    pub auth: AuthPolicy,

    /// Admin credential
    pub credential: CredentialConfig,

    /// Content database
    pub database: DatabaseConfig,

    /// Persisted authenticator state
    pub state: StateConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Bind address
    pub host: String,

    /// Listen port
    pub port: u16,

    /// Allowed CORS origins; empty means same-origin only. The environment
    /// form is a comma-separated list.
    #[serde(deserialize_with = "origin_list")]
    pub cors_origins: Vec<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OriginList {
    List(Vec<String>),
    Joined(String),
}

fn origin_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match OriginList::deserialize(deserializer)? {
        OriginList::List(origins) => origins,
        OriginList::Joined(joined) => joined
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect(),
    })
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            cors_origins: Vec::new(),
        }
    }
}

/// Which credential shape the admin login accepts
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CredentialMode {
    /// PIN only
    #[default]
    Pin,
    /// Username and password
    Password,
}

/// Admin credential, supplied through configuration or environment
#[derive(Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CredentialConfig {
    pub mode: CredentialMode,

    /// Required in `password` mode
    pub username: Option<String>,

    /// PIN or password
    pub secret: String,
}

impl fmt::Debug for CredentialConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialConfig")
            .field("mode", &self.mode)
            .field("username", &self.username)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl CredentialConfig {
    pub fn validate(&self) -> Result<()> {
        if self.secret.is_empty() {
            return Err(SiteError::config(format!(
                "Admin secret missing. Set {ENV_PREFIX}__CREDENTIAL__SECRET or credential.secret"
            )));
        }
        if self.mode == CredentialMode::Password
            && self.username.as_deref().map_or(true, str::is_empty)
        {
            return Err(SiteError::config(
                "credential.username is required in password mode",
            ));
        }
        Ok(())
    }
}

/// Content database configuration
#[derive(Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `libsql://` for a hosted database, `file:` for a local one, empty for in-memory
    pub url: String,

    /// Token for hosted databases
    pub auth_token: String,

    /// Embedded replica path, synced from the hosted database
    pub local_replica: Option<PathBuf>,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &self.url)
            .field("auth_token", &if self.auth_token.is_empty() { "" } else { "[REDACTED]" })
            .field("local_replica", &self.local_replica)
            .finish()
    }
}

impl DatabaseConfig {
    /// Whether content should live in process memory
    pub fn is_in_memory(&self) -> bool {
        self.url.is_empty()
    }

    /// Whether the URL points at a hosted database
    pub fn is_remote(&self) -> bool {
        self.url.starts_with("libsql://") || self.url.starts_with("https://")
    }

    pub fn validate(&self) -> Result<()> {
        if self.is_in_memory() {
            return Ok(());
        }
        if self.is_remote() {
            Url::parse(&self.url)
                .map_err(|e| SiteError::config(format!("Invalid database URL: {e}")))?;
            if self.auth_token.is_empty() {
                return Err(SiteError::config(
                    "database.auth_token is required for a hosted database",
                ));
            }
        }
        Ok(())
    }
}

/// Location of the persisted authenticator state
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    pub path: PathBuf,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".rapidx")
                .join("admin-state.json"),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level when `RUST_LOG` is unset
    pub level: String,

    /// Emit JSON lines instead of compact text
    pub json: bool,

    /// Daily-rotated log file
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from defaults, an optional file, and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&Self::default())?);

        if let Some(path) = path {
            if !path.exists() {
                return Err(SiteError::config(format!(
                    "Configuration file not found: {}",
                    path.display()
                )));
            }
            builder = builder.add_source(config::File::from(path));
        }

        // Values stay strings; numeric fields are converted on deserialize so
        // secrets like "012345" keep their exact text
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__"),
        );

        let config: ServerConfig = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate all sections
    pub fn validate(&self) -> Result<()> {
        self.auth.validate()?;
        self.credential.validate()?;
        self.database.validate()?;
        if self.network.port == 0 {
            return Err(SiteError::config("network.port must be non-zero"));
        }
        Ok(())
    }
}
