use std::{env, fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lang_token::{Reconciler, config::DEFAULT_REFERENCE, flatten};
use lang_token_client::RemoteStore;
use serde_json::Value;
use tracing::{info, subscriber};
use tracing_subscriber::{EnvFilter, fmt};

const SERVER_ENV_KEY: &str = "LANG_TOKEN_SERVER";
const AUTH_TOKEN_ENV_KEY: &str = "LANG_TOKEN_HTTP_TOKEN";
const DEFAULT_SERVER: &str = "http://127.0.0.1:3033";

#[derive(Parser)]
#[command(author, version, about = "Client for a running lang-token file service")]
struct Cli {
    /// Sets the log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Base URL of the file service (fallback env LANG_TOKEN_SERVER).
    #[arg(long)]
    server: Option<String>,

    /// Bearer token for the file service (fallback env LANG_TOKEN_HTTP_TOKEN).
    #[arg(long = "auth-token")]
    auth_token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Lists the language documents the service stores.
    Files {
        /// Include pictures and other non-language files.
        #[arg(long)]
        all: bool,
    },
    /// Lists reference tokens missing in a remote file, computed locally.
    Missing {
        /// Target document name, e.g. fr.json.
        file: String,

        /// Reference document name.
        #[arg(long, default_value = DEFAULT_REFERENCE)]
        reference: String,

        /// Print keys as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Prints the grouped report the service computes for a file.
    Report {
        file: String,

        /// Only include missing tokens.
        #[arg(long)]
        missing_only: bool,
    },
    /// Downloads a document to a local path.
    Pull {
        file: String,

        /// Destination path.
        #[arg(long)]
        out: PathBuf,
    },
    /// Uploads a local JSON document under the given name.
    Push {
        file: String,

        /// Local JSON file to send.
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level)?;

    let server = cli
        .server
        .or_else(|| env::var(SERVER_ENV_KEY).ok())
        .unwrap_or_else(|| DEFAULT_SERVER.to_string());
    let auth_token = cli.auth_token.or_else(|| env::var(AUTH_TOKEN_ENV_KEY).ok());
    let remote = RemoteStore::new(&server, auth_token.as_deref())?;

    match cli.command {
        Command::Files { all } => {
            let files =
                if all { remote.list_files().await? } else { remote.language_files().await? };
            if files.is_empty() {
                println!("No files returned by server.");
            }
            for name in files {
                println!("{name}");
            }
        }
        Command::Missing { file, reference, json } => {
            let reference_doc = remote.fetch(&reference).await?;
            let target_doc = remote.fetch(&file).await?;

            let mut reconciler = Reconciler::new();
            reconciler.load_reference(flatten(&reference_doc));
            reconciler.load_target(flatten(&target_doc));
            let missing: Vec<&str> = reconciler.missing().collect();

            if json {
                println!("{}", serde_json::to_string_pretty(&missing)?);
            } else if missing.is_empty() {
                println!("{file} has every token of {reference}.");
            } else {
                for key in &missing {
                    println!("{key}");
                }
                println!(
                    "{} of {} tokens missing in {file}.",
                    missing.len(),
                    reconciler.reference_count()
                );
            }
        }
        Command::Report { file, missing_only } => {
            let report = remote.report(&file, missing_only).await?;
            println!("{} vs {}: {} missing", report.target, report.reference, report.missing.len());
            for group in &report.groups {
                match &group.picture {
                    Some(picture) => println!("[{}] {picture}", group.prefix),
                    None => println!("[{}]", group.prefix),
                }
                for key in &group.tokens {
                    println!("  {key}");
                }
            }
        }
        Command::Pull { file, out } => {
            let document = remote.fetch(&file).await?;
            let rendered = serde_json::to_string_pretty(&document)?;
            fs::write(&out, rendered)
                .with_context(|| format!("failed to write {}", out.display()))?;
            info!(file = %file, path = %out.display(), "document pulled");
            println!("Saved {file} to {}.", out.display());
        }
        Command::Push { file, path } => {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let document: Value = serde_json::from_str(&content)
                .with_context(|| format!("invalid JSON in file {}", path.display()))?;
            remote.save(&file, &document).await?;
            println!("Pushed {} as {file}.", path.display());
        }
    }

    Ok(())
}

fn init_tracing(level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"));
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();
    let _ = subscriber::set_global_default(subscriber);
    Ok(())
}
