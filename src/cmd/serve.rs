//! `brandhouse serve`: run the dashboard server or initialize its database.

use std::path::{Path, PathBuf};

use anyhow::Result;

use brandhouse::config::DashboardToml;
use brandhouse::dashboard::server::{self, ServerConfig};
use brandhouse::logging::init_tracing;

/// Flags given to `brandhouse serve`. Each one overrides the file and
/// environment value when set.
pub struct ServeOptions {
    pub port: Option<u16>,
    pub db_path: Option<PathBuf>,
    pub init: bool,
    pub dev: bool,
    pub open: bool,
    pub verbose: bool,
}

/// Layer file, environment and flags into one configuration.
pub fn resolve_settings(config_path: &Path, opts: &ServeOptions) -> Result<DashboardToml> {
    let mut toml = DashboardToml::load_or_default(config_path)?;
    toml.apply_env_overrides()?;
    if let Some(port) = opts.port {
        toml.server.port = port;
    }
    if let Some(path) = &opts.db_path {
        toml.server.db_path = path.clone();
    }
    if opts.dev {
        toml.server.dev_mode = true;
    }
    Ok(toml)
}

pub async fn cmd_serve(config_path: &Path, opts: ServeOptions) -> Result<()> {
    let toml = resolve_settings(config_path, &opts)?;
    let problems = toml.validate();
    if !problems.is_empty() {
        anyhow::bail!("Invalid configuration:\n  - {}", problems.join("\n  - "));
    }
    init_tracing(&toml.logging, opts.verbose)?;

    if opts.init {
        server::open_database(&toml.server.db_path, &toml.bootstrap)?;
        println!(
            "Dashboard database initialized at {}",
            toml.server.db_path.display()
        );
        return Ok(());
    }

    if opts.open && !toml.server.dev_mode {
        let url = format!("http://localhost:{}", toml.server.port);
        tokio::spawn(async move {
            // let the listener bind first
            tokio::time::sleep(tokio::time::Duration::from_millis(500)).await;
            if let Err(e) = open::that(&url) {
                tracing::warn!(error = %e, url = url.as_str(), "failed to open browser");
            }
        });
    }

    server::start_server(ServerConfig::from_toml(&toml)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> ServeOptions {
        ServeOptions {
            port: None,
            db_path: None,
            init: false,
            dev: false,
            open: false,
            verbose: false,
        }
    }

    #[test]
    fn test_flags_override_file_values() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("brandhouse.toml");
        std::fs::write(&path, "[server]\nport = 4000\ndb_path = \"file.db\"\n")?;

        let from_file = resolve_settings(&path, &options())?;
        assert_eq!(from_file.server.port, 4000);

        let opts = ServeOptions {
            port: Some(5000),
            db_path: Some(PathBuf::from("flag.db")),
            dev: true,
            ..options()
        };
        let merged = resolve_settings(&path, &opts)?;
        assert_eq!(merged.server.port, 5000);
        assert_eq!(merged.server.db_path, PathBuf::from("flag.db"));
        assert!(merged.server.dev_mode);
        Ok(())
    }
}
