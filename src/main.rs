//! CLI entry point for the mediagrab tool.

use std::io::{self, IsTerminal};
use std::sync::Arc;

use anyhow::{Context, Result};
use mediagrab_core::{
    CancellationFlag, ConsoleStatus, LineSource, Orchestrator, ReaderLineSource,
    TerminalLineSource, load_urls,
};
use tracing::{debug, info, warn};

mod app;
mod app_config;
mod cli;

use app::config_runtime::{
    apply_config_defaults, build_fetcher, build_settings, parse_cli_with_sources,
};
use app::terminal;
use app_config::load_default_file_config;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let (args, cli_sources) = parse_cli_with_sources();

    let status = ConsoleStatus::new(terminal::should_use_spinner(
        io::stderr().is_terminal(),
        args.quiet,
        terminal::is_dumb_terminal(),
    ));

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    terminal::init_tracing(
        terminal::default_log_level(args.quiet, args.verbose),
        terminal::is_no_color_requested(&args),
        &status,
    );
    debug!(?args, "CLI arguments parsed");

    let loaded = load_default_file_config()?;
    if loaded.config.is_some() {
        debug!(path = ?loaded.path, "loaded config file");
    }
    let args = apply_config_defaults(args, &cli_sources, loaded.config.as_ref())?;

    let settings = build_settings(&args);
    let fetcher = build_fetcher(&args)?;
    debug!(program = %fetcher.program().display(), ?settings, "resolved settings");

    // Input is read before the interrupt handler exists so Ctrl-C at the
    // prompt still terminates the process.
    let urls = match &args.file {
        Some(path) => {
            let mut source = ReaderLineSource::open(path)
                .with_context(|| format!("Failed to open URL file '{}'", path.display()))?;
            read_urls(&mut source)?
        }
        None => read_urls(&mut TerminalLineSource::stdin())?,
    };

    let cancel = CancellationFlag::new();
    spawn_interrupt_handler(cancel.clone());

    let orchestrator = Orchestrator::new(settings, Arc::new(fetcher), Arc::new(status))
        .with_cancellation(cancel);

    let report = orchestrator.run_urls(urls).await?;
    println!("{report}");
    info!("mediagrab finished");

    Ok(())
}

fn read_urls(source: &mut dyn LineSource) -> Result<Vec<String>> {
    load_urls(source).context("Failed to read URLs")
}

fn spawn_interrupt_handler(cancel: CancellationFlag) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, no new downloads will start");
            cancel.cancel();
        }
    });
}
