//! Live status lines for active transfers.
//!
//! The fetch capability reports progress ticks while it is moving data. Each
//! active transfer gets its own [`ProgressReporter`] obtained from a
//! [`StatusSink`]; the reporter lives exactly as long as one attempt and its
//! line disappears when it is dropped. Nothing is aggregated across tasks.

use std::fmt;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use url::Url;

/// Maximum characters of a URL shown when it has no parseable host.
const MAX_LABEL_CHARS: usize = 40;

/// One progress tick emitted by the fetch capability.
///
/// Values are kept exactly as the capability formats them (`" 42.0%"`,
/// `"1.00MiB/s"`, `"00:03"`), trimmed of surrounding whitespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    /// Percent complete.
    pub percent: String,
    /// Current transfer speed.
    pub speed: String,
    /// Estimated time remaining.
    pub eta: String,
}

impl ProgressUpdate {
    /// Creates a progress update from its three display fields.
    #[must_use]
    pub fn new(
        percent: impl Into<String>,
        speed: impl Into<String>,
        eta: impl Into<String>,
    ) -> Self {
        Self {
            percent: percent.into(),
            speed: speed.into(),
            eta: eta.into(),
        }
    }
}

impl fmt::Display for ProgressUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "📥 {} @ {}, ETA: {}", self.percent, self.speed, self.eta)
    }
}

/// Receives progress ticks for a single active transfer.
///
/// Dropping the reporter ends the transfer's status line.
pub trait ProgressReporter: Send + Sync {
    /// Called for every progress tick of the transfer.
    fn update(&self, update: &ProgressUpdate);
}

/// Hands out one [`ProgressReporter`] per active transfer.
pub trait StatusSink: Send + Sync {
    /// Starts a status line for a transfer of `url`.
    fn begin(&self, url: &str) -> Box<dyn ProgressReporter>;
}

/// Status sink that discards every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullStatus;

impl StatusSink for NullStatus {
    fn begin(&self, _url: &str) -> Box<dyn ProgressReporter> {
        Box::new(NullReporter)
    }
}

#[derive(Debug)]
struct NullReporter;

impl ProgressReporter for NullReporter {
    fn update(&self, _update: &ProgressUpdate) {}
}

/// Terminal status sink: one spinner line per active transfer.
#[derive(Debug, Clone)]
pub struct ConsoleStatus {
    multi: MultiProgress,
}

impl ConsoleStatus {
    /// Creates a console sink drawing to stderr, or a hidden one when
    /// `visible` is false (non-terminal stderr, quiet mode).
    #[must_use]
    pub fn new(visible: bool) -> Self {
        let target = if visible {
            ProgressDrawTarget::stderr()
        } else {
            ProgressDrawTarget::hidden()
        };
        Self {
            multi: MultiProgress::with_draw_target(target),
        }
    }

    /// Runs `f` with every status line cleared, redrawing them afterwards.
    ///
    /// Anything else writing to stderr while transfers are shown goes
    /// through here so it does not tear the live lines.
    pub fn suspend<F: FnOnce() -> R, R>(&self, f: F) -> R {
        self.multi.suspend(f)
    }
}

impl StatusSink for ConsoleStatus {
    fn begin(&self, url: &str) -> Box<dyn ProgressReporter> {
        let bar = self.multi.add(ProgressBar::new_spinner());
        bar.set_style(
            ProgressStyle::with_template("{spinner} {prefix} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_prefix(transfer_label(url));
        bar.set_message("starting...");
        bar.enable_steady_tick(Duration::from_millis(120));
        Box::new(ConsoleTransfer { bar })
    }
}

struct ConsoleTransfer {
    bar: ProgressBar,
}

impl ProgressReporter for ConsoleTransfer {
    fn update(&self, update: &ProgressUpdate) {
        self.bar.set_message(update.to_string());
    }
}

impl Drop for ConsoleTransfer {
    fn drop(&mut self) {
        self.bar.finish_and_clear();
    }
}

/// Short label for a status line: the URL's host, or a truncated URL.
fn transfer_label(url: &str) -> String {
    if let Some(host) = Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(str::to_string))
    {
        return format!("[{host}]");
    }
    let truncated: String = url.chars().take(MAX_LABEL_CHARS).collect();
    format!("[{truncated}]")
}
