//! `lang-token serve`: the file service the editor talks to.

use std::{env, net::SocketAddr, path::PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use tokio::signal;
use tracing::{debug, error, info, warn};
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::{
    EditorConfig, Layout, default_root,
    paths::expand_tilde,
    store::FsStore,
    web::http::{self, HttpState},
};

const AUTH_TOKEN_ENV_KEY: &str = "LANG_TOKEN_HTTP_TOKEN";

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Bind address for the file service (e.g. 127.0.0.1:3033).
    #[arg(long, value_name = "ADDR", help = "i18n:args.serve.bind")]
    pub bind: Option<SocketAddr>,
    /// Authentication token required by the file service (fallback env LANG_TOKEN_HTTP_TOKEN).
    #[arg(long, value_name = "TOKEN", help = "i18n:args.serve.auth_token")]
    pub auth_token: Option<String>,
}

pub async fn run(root: Option<PathBuf>, args: ServeArgs) -> Result<()> {
    let layout = resolve_layout(root)?;
    layout.ensure()?;
    let _tracing_guard = init_tracing(&layout)?;

    if let Err(err) = run_impl(layout, args).await {
        error!(error = ?err, "file service terminated with error");
        return Err(err);
    }
    info!("file service exited cleanly");
    Ok(())
}

async fn run_impl(layout: Layout, args: ServeArgs) -> Result<()> {
    let config = EditorConfig::load(&layout)?;
    let bind = args.bind.unwrap_or(config.server().bind);
    let auth_token = args
        .auth_token
        .or_else(|| env::var(AUTH_TOKEN_ENV_KEY).ok())
        .or_else(|| config.server().auth_token.clone());

    let state = HttpState {
        store: FsStore::new(&layout),
        reference: config.editor().reference.clone(),
        auth: http::HttpAuth::new(auth_token),
    };
    let auth_enabled = state.auth.is_enabled();
    let handle = http::spawn_http_server(state, bind).await?;

    info!(
        addr = %handle.addr(),
        tokens_dir = %layout.tokens_dir().display(),
        reference = %config.editor().reference,
        auth = auth_enabled,
        "file service ready"
    );

    match signal::ctrl_c().await {
        Ok(()) => info!("received Ctrl+C, shutting down file service"),
        Err(err) => warn!(error = ?err, "failed to listen for Ctrl+C"),
    }

    handle.shutdown().await;
    Ok(())
}

fn resolve_layout(root_override: Option<PathBuf>) -> Result<Layout> {
    let root = match root_override {
        Some(path) => expand_tilde(path)?,
        None => default_root()?,
    };
    debug!(root = %root.display(), "resolved workspace root");
    Ok(Layout::new(root))
}

fn init_tracing(layout: &Layout) -> Result<WorkerGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .context("failed to build log filter")?;

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_writer(std::io::stderr);

    let server_log_dir = layout.logs_dir().join("server");
    std::fs::create_dir_all(&server_log_dir).with_context(|| {
        format!("failed to create server log directory {}", server_log_dir.display())
    })?;
    let file_appender = rolling::hourly(server_log_dir, "server.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .json()
        .with_writer(file_writer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("failed to install tracing subscriber")?;

    Ok(guard)
}
