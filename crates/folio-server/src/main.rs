//! `folio` command-line entry point.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{error, info, warn};

use folio_server::config::load_settings;
use folio_server::logging::init_tracing;
use folio_server::{router, AppContext};

#[derive(Debug, Parser)]
#[command(name = "folio", version, about = "File-backed publishing engine")]
struct Cli {
    /// Path to the site configuration (defaults to ./folio.toml).
    #[arg(short, long, env = "FOLIO_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the site (default).
    Serve {
        /// Address to listen on, overriding `server.bind`.
        #[arg(short, long)]
        bind: Option<String>,
    },
    /// List the extensions discovery would mount.
    Extensions,
    /// Compile all templates and list their keys.
    Templates,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let loaded = load_settings(cli.config.as_deref()).context("loading configuration")?;
    let mut settings = loaded.settings;
    init_tracing(settings.server.log_format);
    if let Some(e) = loaded.fallback {
        warn!(error = %e, "Failed to load config, using defaults");
    }

    match cli.command.unwrap_or(Command::Serve { bind: None }) {
        Command::Serve { bind } => {
            if let Some(bind) = bind {
                settings.server.bind = bind;
            }
            serve(settings).await
        }
        Command::Extensions => {
            settings.templates.watch = false;
            let ctx = AppContext::bootstrap(settings).await?;
            for mount in ctx.mounts().mounts() {
                println!("{:<24} {:<16} {} handlers", mount.name, mount.path, mount.stack.len());
            }
            Ok(())
        }
        Command::Templates => {
            settings.templates.watch = false;
            let ctx = AppContext::bootstrap(settings).await?;
            if let Some(report) = ctx.wait_for_templates().await {
                info!(compiled = report.compiled, failed = report.failed, "Templates compiled");
            }
            for key in ctx.templates.keys() {
                let engine = ctx.templates.lookup(&key).map(|e| e.engine).unwrap_or("?");
                println!("{key:<40} {engine}");
            }
            Ok(())
        }
    }
}

async fn serve(settings: folio_server::Settings) -> anyhow::Result<()> {
    let bind = settings.server.bind.clone();
    let ctx = AppContext::bootstrap(settings).await?;
    let app = router(ctx);

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("binding {bind}"))?;
    info!(address = %bind, "folio listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C");
        },
        _ = terminate => {
            info!("Received SIGTERM");
        },
    }
}
