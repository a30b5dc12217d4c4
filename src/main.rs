mod api;
mod database;
mod ingest;
mod media;
mod stream;
mod utils;

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::database::records::Family;
use crate::database::repo::{count, open_database};
use crate::ingest::orchestrator::run_scan;
use crate::ingest::state::ScanScheduler;
use crate::utils::config::{validate_root, DEFAULT_CONFIG_FILE, DEFAULT_DB_FILE};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the feed API and the media files under the configured root.
    Serve {
        #[arg(short, long, default_value = "127.0.0.1:8000")]
        bind: SocketAddr,

        #[arg(short, long, default_value = DEFAULT_DB_FILE)]
        db_path: PathBuf,

        #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,

        /// Static viewer assets mounted under /viewer.
        #[arg(long)]
        viewer_dir: Option<PathBuf>,
    },
    /// Run one ingestion pass over a directory and exit.
    Scan {
        #[arg(short, long)]
        input_dir: PathBuf,

        #[arg(short, long, default_value = DEFAULT_DB_FILE)]
        db_path: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    match args.command {
        Command::Serve { bind, db_path, config, viewer_dir } => {
            info!("Feed server starting...");
            info!("DB: {:?}", db_path);
            api::serve(bind, config, db_path, viewer_dir)
        }
        Command::Scan { input_dir, db_path } => scan_once(input_dir, db_path),
    }
}

fn scan_once(input_dir: PathBuf, db_path: PathBuf) -> Result<()> {
    let root = validate_root(&input_dir.to_string_lossy())?;
    info!("Input: {:?}", root);
    info!("DB: {:?}", db_path);

    let progress = ProgressBar::new(0);
    progress.set_style(
        ProgressStyle::with_template("{spinner} [{elapsed_precise}] {bar:40} {pos}/{len} folders")?,
    );

    let scheduler = ScanScheduler::new();
    let summary = run_scan(&scheduler, &root, &db_path, &progress)
        .ok_or_else(|| anyhow!("scan already running"))??;

    info!(
        "Artworks: {}, posts: {}, unclassified: {}, skipped files: {}, failed folders: {}",
        summary.works, summary.posts, summary.unclassified, summary.skipped, summary.failed_tasks
    );
    info!("{}", summary.final_message());

    let conn = open_database(&db_path)?;
    for family in Family::ALL {
        info!("{} records stored: {}", family, count(&conn, family)?);
    }
    Ok(())
}
