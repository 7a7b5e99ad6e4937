mod migrate;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use codetype_config::ConfigLoader;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "codetype",
    version,
    about = "codetype - practice history and account service"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (YAML or TOML). Defaults to config.yml or config.toml in the working directory
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error). Overrides the configured level
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending migrations and start the HTTP server
    Serve {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(long)]
        port: Option<u16>,
    },

    /// Apply pending database migrations and exit
    Migrate {
        /// Only show which migrations are applied
        #[arg(long)]
        status: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let loader = match &cli.config {
        Some(path) => ConfigLoader::with_file(path),
        None => ConfigLoader::new(),
    };
    let mut config = loader.load()?;

    let level = cli
        .log_level
        .clone()
        .or_else(|| config.log_level.clone())
        .unwrap_or_else(|| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level)),
        )
        .init();

    match cli.command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }

            let server = codetype_gateway::GatewayServer::new(config);
            server.run().await?;
        }
        Commands::Migrate { status } => {
            let database = config.database;
            if status {
                let statuses =
                    tokio::task::spawn_blocking(move || migrate::migration_status(&database))
                        .await??;
                migrate::print_status(&statuses);
            } else {
                let report =
                    tokio::task::spawn_blocking(move || migrate::run_migrations(&database))
                        .await??;
                migrate::print_report(&report);
            }
        }
    }

    Ok(())
}
