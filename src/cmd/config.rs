//! `brandhouse config`: show, validate and create the configuration file.

use std::path::Path;

use anyhow::Result;

use super::super::ConfigCommands;
use brandhouse::config::DashboardToml;

fn print_settings(toml: &DashboardToml) {
    println!("[server]");
    println!("  host = \"{}\"", toml.server.host);
    println!("  port = {}", toml.server.port);
    println!("  db_path = \"{}\"", toml.server.db_path.display());
    println!("  dev_mode = {}", toml.server.dev_mode);
    println!();
    println!("[auth]");
    println!("  session_ttl_hours = {}", toml.auth.session_ttl_hours);
    println!();
    println!("[bootstrap]");
    println!("  manager_name = \"{}\"", toml.bootstrap.manager_name);
    println!("  manager_username = \"{}\"", toml.bootstrap.manager_username);
    println!("  manager_password = <hidden>");
    println!();
    println!("[logging]");
    println!("  level = \"{}\"", toml.logging.level);
    println!("  json = {}", toml.logging.json);
    println!();
}

pub fn cmd_config(config_path: &Path, command: Option<ConfigCommands>) -> Result<()> {
    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Brands in House Configuration");
            println!("=============================");
            println!();

            if config_path.exists() {
                println!("Config file: {}", config_path.display());
            } else {
                println!("No brandhouse.toml found at {}", config_path.display());
                println!("Using default configuration.");
            }
            println!();

            let mut toml = DashboardToml::load_or_default(config_path)?;
            toml.apply_env_overrides()?;
            println!("Effective values (with env overrides):");
            println!();
            print_settings(&toml);

            if !config_path.exists() {
                println!("Run 'brandhouse config init' to create a brandhouse.toml file.");
                println!();
            }
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            if !config_path.exists() {
                println!("No brandhouse.toml found. Using defaults (valid).");
                return Ok(());
            }

            let toml = DashboardToml::load(config_path)?;
            let warnings = toml.validate();

            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in &warnings {
                    println!("  - {}", warning);
                }
                println!();
                anyhow::bail!("{} configuration problem(s) found", warnings.len());
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("brandhouse.toml already exists at {}", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            if let Some(parent) = config_path.parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent)?;
            }

            DashboardToml::default().save(config_path)?;

            println!("Created brandhouse.toml at {}", config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [server] host, port, db_path, dev_mode");
            println!("  - [bootstrap] the first manager account (change the password!)");
            println!("  - [logging] level, json");
            println!();
        }
    }

    Ok(())
}
