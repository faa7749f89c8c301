//! VistaView CLI
//!
//! Runs the HTTP API or ingests a catalog directly from the command line.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use vistaview::{
    config,
    database::{self, ProductRepository, SessionRepository},
    error::Result,
    models::{Config, IngestReport, LoggingConfig},
    server::{self, AppState},
    storage::build_store,
    utils::log,
};

/// VistaView - PDF catalog ingestion and search API
#[derive(Parser, Debug)]
#[command(name = "vistaview", version, about = "PDF catalog ingestion and search API")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "data/config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API
    Serve {
        /// Override the listen host
        #[arg(long)]
        host: Option<String>,

        /// Override the listen port
        #[arg(long)]
        port: Option<u16>,
    },

    /// Ingest a catalog from a local path or an http(s) URL
    Ingest {
        source: String,
    },

    /// Validate the configuration
    Validate,

    /// Show storage, database and catalog counts
    Info,
}

/// Initialize logging. `RUST_LOG` wins over the configured level.
fn init_logging(logging: &LoggingConfig, verbose: bool, json: bool) {
    let level = if verbose {
        "debug".to_string()
    } else {
        std::env::var("LOG_LEVEL").unwrap_or_else(|_| logging.level.clone())
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let json = json || logging.json;

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| fmt::layer().json()))
        .with((!json).then(|| fmt::layer()))
        .init();
}

fn print_report(report: &IngestReport) {
    log::summary(
        "Ingest",
        &[
            ("session", report.session_id.clone()),
            ("pages processed", report.pages_processed.to_string()),
            ("products created", report.products_created.to_string()),
            ("images extracted", report.images_extracted.to_string()),
            ("collages created", report.collages_created.to_string()),
            ("pages failed", report.pages_failed.to_string()),
        ],
    );
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logging settings only; a broken file is reported again by load_all.
    let logging = Config::load(&cli.config)
        .map(|c| c.logging)
        .unwrap_or_default();
    init_logging(&logging, cli.verbose, cli.json_logs);

    let mut config = match config::load_all(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            return Err(e);
        }
    };
    tracing::debug!("Loaded configuration from {}", cli.config.display());

    match cli.command {
        Command::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            log::header("VistaView API");
            server::serve(config).await?;
        }

        Command::Ingest { source } => {
            log::header("VistaView Ingest");
            log::step(1, 2, "Connecting database and object store");
            let state = AppState::connect(config).await?;

            log::step(2, 2, &format!("Ingesting {}", source));
            let report = if source.starts_with("http://") || source.starts_with("https://") {
                state.ingestor.ingest_url(&source).await?
            } else {
                state.ingestor.ingest_path(&source).await?
            };
            print_report(&report);
        }

        Command::Validate => {
            log::summary(
                "Config OK",
                &[
                    ("file", cli.config.display().to_string()),
                    ("storage backend", format!("{:?}", config.storage.backend)),
                    ("database", config.database.url.clone()),
                    ("listen", config.server.bind_addr()),
                ],
            );
        }

        Command::Info => {
            let store = build_store(&config.storage).await?;
            let pool = database::connect(&config.database).await?;
            let products = ProductRepository::new(pool.clone()).count().await?;
            let sessions = SessionRepository::new(pool).count().await?;

            log::summary(
                "VistaView",
                &[
                    ("storage", store.describe()),
                    ("public base URL", config.storage.public_base_url.clone()),
                    ("database", config.database.url.clone()),
                    ("products", products.to_string()),
                    ("sessions", sessions.to_string()),
                ],
            );
        }
    }

    Ok(())
}
