//! CLI entry point for the mirrorfetch tool.

use std::fs::File;
use std::io::{self, IsTerminal};

use anyhow::{Context, Result, bail};
use clap::Parser;
use mirrorfetch::{
    AgentConfig, AgentDriver, ArtifactSource, ManifestSource, MetalinkDocument, Orchestrator,
    ProxyConfig, StoreLayout,
};
use tracing::{debug, info, warn};

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Determine log level based on verbose/quiet flags
    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    // Logs go to stderr: stdout belongs to the agent's progress output
    // and to the `--metalink-out -` document mode.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    // Read the resolved-package manifest: from the positional path or stdin
    let source = match args.manifest {
        Some(path) => ManifestSource::Path(path),
        None if !io::stdin().is_terminal() => ManifestSource::Stdin,
        None => {
            info!("No manifest provided. Pipe a resolved-package manifest via stdin or pass a path.");
            info!("Example: resolver --format json | mirrorfetch --store /var/cache/pkgs");
            return Ok(());
        }
    };
    let artifacts = source.artifacts().await?;
    info!(artifacts = artifacts.len(), "manifest loaded");

    // Serialization-only mode: emit the transfer document, no network
    if let Some(out) = args.metalink_out {
        let document = MetalinkDocument::new(&artifacts);
        if out.as_os_str() == "-" {
            let stdout = io::stdout();
            document.write_to(&mut stdout.lock())?;
        } else {
            let mut file = File::create(&out)
                .with_context(|| format!("cannot create {}", out.display()))?;
            document.write_to(&mut file)?;
            info!(path = %out.display(), "transfer description written");
        }
        return Ok(());
    }

    let Some(store) = args.store else {
        // clap enforces this; kept as a guard for direct construction.
        bail!("--store is required when performing a transfer");
    };
    let layout = StoreLayout::open(&store)
        .with_context(|| format!("store {} unavailable", store.display()))?;

    let driver = AgentDriver::new(AgentConfig {
        program: args.agent,
        check_integrity: args.check_hash,
        proxy: ProxyConfig::from_env(),
    });

    let orchestrator = Orchestrator::new(layout, driver, args.check_hash);
    let report = orchestrator.fetch(&artifacts).await;

    if report.success {
        info!("all requested artifacts are present in the store");
        return Ok(());
    }

    for filename in &report.missing {
        warn!(%filename, "still missing after transfer");
    }
    if report.missing.is_empty() {
        // Everything promoted, but the agent exited uncleanly.
        bail!("transfer agent reported failure");
    }
    bail!(
        "{} of {} artifact(s) could not be fetched; re-run to resume",
        report.missing.len(),
        artifacts.len()
    )
}
