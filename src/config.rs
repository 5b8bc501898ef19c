//! Configuration for the dashboard service.
//!
//! Settings are read from `brandhouse.toml` in the working directory (or a
//! path given with `--config`). Every field has a default, so an empty or
//! missing file is valid. Values are layered file → environment → CLI.
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! host = "127.0.0.1"
//! port = 3142
//! db_path = ".brandhouse/dashboard.db"
//! dev_mode = false
//!
//! [auth]
//! session_ttl_hours = 12
//!
//! [bootstrap]
//! manager_name = "Manager"
//! manager_username = "manager"
//! manager_password = "change-me"
//!
//! [logging]
//! level = "info"
//! json = false
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default file name looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "brandhouse.toml";

/// HTTP listener and database location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    /// Permissive CORS and bind on all interfaces
    #[serde(default)]
    pub dev_mode: bool,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3142
}

fn default_db_path() -> PathBuf {
    PathBuf::from(".brandhouse/dashboard.db")
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            db_path: default_db_path(),
            dev_mode: false,
        }
    }
}

/// Session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSection {
    /// How long a login token stays valid
    #[serde(default = "default_session_ttl_hours")]
    pub session_ttl_hours: i64,
}

fn default_session_ttl_hours() -> i64 {
    12
}

impl Default for AuthSection {
    fn default() -> Self {
        Self {
            session_ttl_hours: default_session_ttl_hours(),
        }
    }
}

/// The manager account created on first start when none exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapSection {
    #[serde(default = "default_manager_name")]
    pub manager_name: String,
    #[serde(default = "default_manager_username")]
    pub manager_username: String,
    #[serde(default = "default_manager_password")]
    pub manager_password: String,
}

fn default_manager_name() -> String {
    "Manager".to_string()
}

fn default_manager_username() -> String {
    "manager".to_string()
}

fn default_manager_password() -> String {
    "change-me".to_string()
}

impl Default for BootstrapSection {
    fn default() -> Self {
        Self {
            manager_name: default_manager_name(),
            manager_username: default_manager_username(),
            manager_password: default_manager_password(),
        }
    }
}

/// Log filter and output format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSection {
    /// `EnvFilter` directive, e.g. "info" or "brandhouse=debug,tower_http=info"
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Root of `brandhouse.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DashboardToml {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub auth: AuthSection,
    #[serde(default)]
    pub bootstrap: BootstrapSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

impl DashboardToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse brandhouse.toml")
    }

    /// Load from `path`, falling back to defaults when the file is absent.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize brandhouse.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Apply `BRANDHOUSE_*` overrides from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides using an arbitrary variable lookup.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("BRANDHOUSE_PORT") {
            self.server.port = port
                .parse()
                .with_context(|| format!("BRANDHOUSE_PORT is not a valid port: '{}'", port))?;
        }
        if let Some(path) = lookup("BRANDHOUSE_DB_PATH") {
            self.server.db_path = PathBuf::from(path);
        }
        if let Some(password) = lookup("BRANDHOUSE_MANAGER_PASSWORD") {
            self.bootstrap.manager_password = password;
        }
        if let Some(level) = lookup("BRANDHOUSE_LOG") {
            self.logging.level = level;
        }
        Ok(())
    }

    /// Validate the configuration and return a list of problems.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.server.port == 0 {
            warnings.push("server.port must be non-zero".to_string());
        }
        if self.auth.session_ttl_hours < 1 {
            warnings.push(format!(
                "auth.session_ttl_hours must be at least 1 (got {})",
                self.auth.session_ttl_hours
            ));
        }
        if self.bootstrap.manager_username.trim().is_empty() {
            warnings.push("bootstrap.manager_username must not be empty".to_string());
        }
        if self.bootstrap.manager_password.is_empty() {
            warnings.push("bootstrap.manager_password must not be empty".to_string());
        }
        if tracing_subscriber::EnvFilter::try_new(&self.logging.level).is_err() {
            warnings.push(format!(
                "logging.level '{}' is not a valid filter directive",
                self.logging.level
            ));
        }

        warnings
    }
}

/// Resolve the config path: explicit flag wins, else `./brandhouse.toml`.
pub fn resolve_config_path(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME))
}
