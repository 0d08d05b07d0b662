//! cxo-chat: a terminal assistant that answers questions about your
//! calendar, mail, files and knowledge base.

mod app;
mod chat;
mod config;
mod error;
mod ingest;

use clap::{Parser, Subcommand};
use cxo_chat_core::SessionId;
use cxo_chat_store::{GroundingDocumentRepository, connect, run_migrations};
use error::AppError;
use rootcause::Report;
use rootcause::prelude::ResultExt;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "cxo-chat")]
#[command(about = "Chat assistant with calendar, mail, file and knowledge-base tools")]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(long, global = true, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Chat interactively
    Chat {
        /// Continue a stored session
        #[arg(long)]
        resume: Option<SessionId>,
    },

    /// Create or upgrade the database schema
    PrimeDb,

    /// Add text files to the knowledge base
    Ingest {
        /// Files to add
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "failed to start async runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(report) => {
            error!(error = %report, "command failed");
            eprintln!("error: {}", report.current_context());
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Report<AppError>> {
    match cli.command {
        Command::Chat { resume } => {
            let config = config::AppConfig::load(&cli.config).context(AppError::Configuration)?;
            info!(config = %cli.config.display(), "loaded configuration");
            let assistant = app::Assistant::build(&config).await?;
            chat::run(&assistant, resume).await
        }
        Command::PrimeDb => {
            let database = config::load_database(&cli.config).context(AppError::Configuration)?;
            let pool = connect(&database).await.context(AppError::Startup {
                component: "document store",
            })?;
            run_migrations(&pool).await.context(AppError::Startup {
                component: "schema migrations",
            })?;
            info!("database schema is up to date");
            Ok(())
        }
        Command::Ingest { paths } => {
            let database = config::load_database(&cli.config).context(AppError::Configuration)?;
            let pool = connect(&database).await.context(AppError::Startup {
                component: "document store",
            })?;
            let count = ingest::ingest(&GroundingDocumentRepository::new(pool), &paths).await?;
            info!(documents = count, "ingest finished");
            Ok(())
        }
    }
}
