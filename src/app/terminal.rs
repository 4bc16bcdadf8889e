use std::io::{self, Write};

use mediagrab_core::ConsoleStatus;
use tracing_subscriber::fmt::MakeWriter;

use crate::cli::Args;

pub(crate) fn no_color_env_requested() -> bool {
    std::env::var_os("NO_COLOR").is_some_and(|value| !value.is_empty())
}

pub(crate) fn is_dumb_terminal() -> bool {
    std::env::var("TERM")
        .map(|value| value.eq_ignore_ascii_case("dumb"))
        .unwrap_or(false)
}

pub(crate) fn should_disable_color(
    no_color_flag: bool,
    no_color_env: bool,
    dumb_terminal: bool,
) -> bool {
    no_color_flag || no_color_env || dumb_terminal
}

pub(crate) fn is_no_color_requested(args: &Args) -> bool {
    should_disable_color(args.no_color, no_color_env_requested(), is_dumb_terminal())
}

pub(crate) fn should_use_spinner(
    stderr_is_terminal: bool,
    quiet: bool,
    dumb_terminal: bool,
) -> bool {
    stderr_is_terminal && !quiet && !dumb_terminal
}

/// Log level used when `RUST_LOG` is not set.
pub(crate) fn default_log_level(quiet: bool, verbose: u8) -> &'static str {
    if quiet {
        "error"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

pub(crate) fn init_tracing(default_level: &str, no_color: bool, status: &ConsoleStatus) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_writer(StatusAwareStderr::new(status.clone()))
        .with_ansi(!no_color)
        .with_env_filter(filter)
        .try_init();
}

/// Log writer for stderr that clears the live status lines around each event.
#[derive(Debug, Clone)]
pub(crate) struct StatusAwareStderr {
    status: ConsoleStatus,
}

impl StatusAwareStderr {
    pub(crate) fn new(status: ConsoleStatus) -> Self {
        Self { status }
    }
}

impl<'a> MakeWriter<'a> for StatusAwareStderr {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

impl Write for StatusAwareStderr {
    // the fmt layer hands over each formatted event in a single write
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.status.suspend(|| io::stderr().write_all(buf))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}
