use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cmd;

#[derive(Parser)]
#[command(name = "brandhouse")]
#[command(version, about = "Brands in House operations dashboard server")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to brandhouse.toml (defaults to ./brandhouse.toml)
    #[arg(long, global = true, env = "BRANDHOUSE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the dashboard API and WebSocket server
    Serve {
        /// Port to serve on
        #[arg(short, long)]
        port: Option<u16>,

        /// Database path
        #[arg(long)]
        db_path: Option<PathBuf>,

        /// Initialize database and manager account only (don't start server)
        #[arg(long)]
        init: bool,

        /// Enable dev mode (permissive CORS, bind on all interfaces)
        #[arg(long)]
        dev: bool,

        /// Open the dashboard in a browser after the server starts
        #[arg(long)]
        open: bool,
    },
    /// View, validate or create brandhouse.toml
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Write a default brandhouse.toml
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config_path = brandhouse::config::resolve_config_path(cli.config.as_deref());

    match &cli.command {
        Commands::Serve {
            port,
            db_path,
            init,
            dev,
            open,
        } => {
            cmd::cmd_serve(
                &config_path,
                cmd::ServeOptions {
                    port: *port,
                    db_path: db_path.clone(),
                    init: *init,
                    dev: *dev,
                    open: *open,
                    verbose: cli.verbose,
                },
            )
            .await?;
        }
        Commands::Config { command } => cmd::cmd_config(&config_path, command.clone())?,
    }

    Ok(())
}
