mod cli;
mod config;
mod elendur_client;

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use dotenv::dotenv;
use eyre::Result;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use crate::cli::chat::ChatContext;
use crate::config::Config;
use crate::elendur_client::ElendurClient;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Ask a single question and exit
    #[arg(short, long)]
    input: Option<String>,

    /// Backend base URL (defaults to $ELENDUR_BASE_URL or http://127.0.0.1:8000/)
    #[arg(short, long)]
    base_url: Option<String>,

    /// Directory where generated PDFs are saved (defaults to $ELENDUR_DOWNLOAD_DIR or the download folder)
    #[arg(short, long)]
    download_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load environment variables from .env file
    dotenv().ok();

    let cli = Cli::parse();

    let log_level = if cli.verbose { Level::DEBUG } else { Level::WARN };

    // Logs go to stderr so they stay out of the transcript
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let config = Config::resolve(cli.base_url, cli.download_dir)?;
    info!("Starting Elendur chat against {}", config.base_url);

    let backend = Arc::new(ElendurClient::new(&config.base_url)?);
    let interactive = cli.input.is_none();

    let mut chat_context = ChatContext::new(
        Box::new(io::stdout()),
        backend,
        config.download_dir,
        cli.input,
        interactive,
    );
    chat_context.run().await
}
