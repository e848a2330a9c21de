//! toolpin CLI entry point.

// CLI binary needs to output to stdout/stderr - this is intentional
#![allow(clippy::print_stdout, clippy::print_stderr)]

mod cli;
mod commands;
mod logging;

use crate::cli::{Cli, Commands};
use crate::logging::{TracingConfig, init_tracing};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use toolpin_core::tools::{Installer, InstallerOptions};
use toolpin_tools_go::GoBuilder;
use toolpin_tools_url::HttpArchiveFetcher;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> miette::Result<()> {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panicked: {panic_info}");
        eprintln!("Internal error occurred. Run with RUST_LOG=debug for more information.");
    }));

    let cli = cli::parse();
    init_tracing(TracingConfig {
        format: cli.log_format,
        level: cli.level.into(),
        ..Default::default()
    })?;

    let cancel = CancellationToken::new();
    spawn_cancellation(cancel.clone(), cli.timeout.map(Duration::from_secs));

    run(cli, &cancel).await
}

/// Cancel `token` on Ctrl-C or once `timeout` elapses.
fn spawn_cancellation(token: CancellationToken, timeout: Option<Duration>) {
    tokio::spawn(async move {
        let deadline = async {
            match timeout {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending().await,
            }
        };
        tokio::select! {
            () = token.cancelled() => return,
            result = tokio::signal::ctrl_c() => match result {
                Ok(()) => info!("Received Ctrl-C, cancelling"),
                Err(e) => {
                    warn!(error = %e, "Cannot listen for Ctrl-C");
                    return;
                }
            },
            () = deadline => warn!(?timeout, "Timed out, cancelling"),
        }
        token.cancel();
    });
}

async fn run(cli: Cli, cancel: &CancellationToken) -> miette::Result<()> {
    let registry = Arc::new(commands::create_registry(&cli.catalogs)?);

    let mut options = InstallerOptions::new();
    if let Some(dir) = cli.cache_dir {
        options = options.with_cache_dir(dir);
    }
    let installer = Installer::new(
        registry.clone(),
        Arc::new(HttpArchiveFetcher::new()?),
        &options,
    )?
    .with_builder(Arc::new(GoBuilder::new()));

    let mut out = std::io::stdout().lock();
    match cli.command {
        Commands::Ensure { tools, platform } => {
            commands::ensure(&installer, cancel, &tools, &platform, &mut out).await
        }
        Commands::InstallAll { platform } => {
            commands::install_all(&installer, cancel, &platform, &mut out).await
        }
        Commands::Verify { tools } => commands::verify(&installer, cancel, &tools, &mut out).await,
        Commands::List { platform } => commands::list(&registry, platform.as_ref(), &mut out),
        Commands::Which { tool, platform } => commands::which(&installer, &tool, &platform, &mut out),
    }
}
