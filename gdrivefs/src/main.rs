use std::io::Write;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use gdrive_core::DriveClient;
use gdrivefs::config::FsConfig;
use gdrivefs::fs::remote::DriveStore;
use gdrivefs::{DriveFs, ListOptions};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::io::AsyncReadExt;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "gdrivefs", version, about = "Path-based access to Google Drive")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
enum Command {
    /// List a directory
    Ls {
        #[arg(default_value = "/")]
        path: String,
        /// Only directories
        #[arg(long, conflicts_with = "files")]
        dirs: bool,
        /// Only files
        #[arg(long)]
        files: bool,
        /// Shell-style name filter, e.g. '*.txt'
        #[arg(long)]
        pattern: Option<String>,
        /// Print paths relative to the drive root instead of names
        #[arg(long)]
        full: bool,
        /// Print absolute paths instead of names
        #[arg(long)]
        absolute: bool,
    },
    /// Print a file's contents
    Cat { path: String },
    /// Write a file (reads stdin when no content is given)
    Put { path: String, content: Option<String> },
    /// Create a directory
    Mkdir {
        path: String,
        /// Create missing parents too
        #[arg(short, long)]
        parents: bool,
    },
    /// Remove a file
    Rm { path: String },
    /// Remove a directory
    Rmdir {
        path: String,
        /// Also remove parents left empty
        #[arg(short, long)]
        recursive: bool,
        /// Remove contents first
        #[arg(short, long)]
        force: bool,
    },
    /// Rename or move a file or directory
    Mv { src: String, dst: String },
    /// Copy a file
    Cp {
        src: String,
        dst: String,
        /// Replace an existing destination file
        #[arg(short, long)]
        force: bool,
    },
    /// Show a file's size and timestamps
    Stat { path: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("GDRIVEFS_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = FsConfig::from_env();
    let client = DriveClient::with_base_url(&config.api_base, config.require_token()?)
        .context("invalid drive api configuration")?;
    let store = DriveStore::new(client).with_page_size(config.page_size);
    let fs = DriveFs::with_index_ttl(Arc::new(store), config.index_ttl)
        .await
        .context("failed to index drive contents")?;
    tracing::info!(api_base = %config.api_base, "drive indexed");

    run(&fs, cli.command).await
}

async fn run(fs: &DriveFs, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Ls {
            path,
            dirs,
            files,
            pattern,
            full,
            absolute,
        } => {
            let options = ListOptions {
                wildcard: pattern,
                full,
                absolute,
                dirs_only: dirs,
                files_only: files,
            };
            for entry in fs.listdir(&path, &options).await? {
                println!("{entry}");
            }
        }
        Command::Cat { path } => {
            let data = fs.getcontents(&path).await?;
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&data)?;
            stdout.flush()?;
        }
        Command::Put { path, content } => {
            let data = match content {
                Some(content) => content.into_bytes(),
                None => {
                    let mut buf = Vec::new();
                    tokio::io::stdin()
                        .read_to_end(&mut buf)
                        .await
                        .context("failed to read stdin")?;
                    buf
                }
            };
            fs.setcontents(&path, &data).await?;
        }
        Command::Mkdir { path, parents } => fs.makedir(&path, parents, parents).await?,
        Command::Rm { path } => fs.remove(&path).await?,
        Command::Rmdir {
            path,
            recursive,
            force,
        } => fs.removedir(&path, recursive, force).await?,
        Command::Mv { src, dst } => fs.rename(&src, &dst).await?,
        Command::Cp { src, dst, force } => fs.copy(&src, &dst, force).await?,
        Command::Stat { path } => {
            let info = fs.getinfo(&path).await?;
            println!("size:     {}", info.size);
            println!("created:  {}", format_time(info.created_time)?);
            println!("modified: {}", format_time(info.modified_time)?);
            println!("accessed: {}", format_time(info.accessed_time)?);
        }
    }
    Ok(())
}

fn format_time(value: Option<OffsetDateTime>) -> anyhow::Result<String> {
    match value {
        Some(value) => Ok(value.format(&Rfc3339)?),
        None => Ok("-".to_string()),
    }
}
