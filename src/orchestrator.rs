//! End-to-end run driver.
//!
//! Loads URLs, filters them through the [`Validator`], builds one shared
//! [`FetchConfig`] and hands the remaining work to the [`Dispatcher`]. The
//! orchestrator itself is sequential and owns no retry or concurrency logic.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::download::{
    CancellationFlag, DEFAULT_BASE_DELAY, DEFAULT_DOWNLOADED_LOG, DEFAULT_FAILED_LOG,
    DEFAULT_MAX_RETRIES, DEFAULT_THREADS, DispatchError, Dispatcher, ResultLogger, RetryPolicy,
    RunSummary, Task,
};
use crate::fetch::{
    AudioExtraction, DEFAULT_ARCHIVE_FILE, DEFAULT_MERGE_CONTAINER, FetchConfig, Fetcher,
    MediaMode,
};
use crate::input::{LineSource, load_urls};
use crate::progress::StatusSink;
use crate::validate::Validator;

/// Default output root.
pub const DEFAULT_OUTPUT_DIR: &str = "downloads";

/// Resolved settings for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Root directory for downloaded media.
    pub output_dir: PathBuf,
    /// Number of concurrent workers.
    pub threads: usize,
    /// Download audio only and convert it.
    pub audio_only: bool,
    /// Attempts per task, including the first.
    pub max_retries: u32,
    /// Delay before the first retry; doubles for each further retry.
    pub base_delay: Duration,
    pub downloaded_log: PathBuf,
    pub failed_log: PathBuf,
    /// Archive the fetch engine uses to skip already completed items.
    pub archive_file: PathBuf,
    pub merge_container: String,
    /// Post-step used in audio-only mode.
    pub audio: AudioExtraction,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            threads: DEFAULT_THREADS,
            audio_only: false,
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
            downloaded_log: PathBuf::from(DEFAULT_DOWNLOADED_LOG),
            failed_log: PathBuf::from(DEFAULT_FAILED_LOG),
            archive_file: PathBuf::from(DEFAULT_ARCHIVE_FILE),
            merge_container: DEFAULT_MERGE_CONTAINER.to_string(),
            audio: AudioExtraction::default(),
        }
    }
}

impl Settings {
    #[must_use]
    pub fn media_mode(&self) -> MediaMode {
        if self.audio_only {
            MediaMode::AudioOnly
        } else {
            MediaMode::Video
        }
    }

    /// Builds the fetch options shared by every task of the run.
    #[must_use]
    pub fn fetch_config(&self) -> FetchConfig {
        FetchConfig::new(&self.output_dir, self.media_mode())
            .with_merge_container(self.merge_container.clone())
            .with_archive_file(self.archive_file.clone())
            .with_audio_extraction(self.audio.clone())
    }

    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, self.base_delay)
    }

    #[must_use]
    pub fn result_logger(&self) -> ResultLogger {
        ResultLogger::new(self.downloaded_log.clone(), self.failed_log.clone())
    }
}

/// Errors that stop a run.
#[derive(Debug, Error)]
pub enum RunError {
    /// The URL input could not be read.
    #[error("failed to read URL input: {0}")]
    Input(#[source] std::io::Error),

    /// The output directory could not be created.
    #[error("failed to create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The dispatcher hit an internal fault.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunReport {
    /// The input contained no URLs.
    NoUrls,
    /// Every URL was rejected by validation; nothing was dispatched.
    NoValidUrls {
        /// Number of rejected URLs.
        rejected: usize,
    },
    /// Dispatch ran to completion.
    Completed(RunSummary),
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoUrls => write!(f, "❌ No URLs provided."),
            Self::NoValidUrls { .. } => write!(f, "❌ All URLs invalid."),
            Self::Completed(summary) => {
                write!(
                    f,
                    "✅ All downloads complete! (downloaded: {}, failed: {}",
                    summary.downloaded(),
                    summary.failed()
                )?;
                if summary.skipped() > 0 {
                    write!(f, ", skipped: {}", summary.skipped())?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Composes input, validation and dispatch for one run.
pub struct Orchestrator {
    settings: Settings,
    fetcher: Arc<dyn Fetcher>,
    status: Arc<dyn StatusSink>,
    cancel: CancellationFlag,
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    #[must_use]
    pub fn new(settings: Settings, fetcher: Arc<dyn Fetcher>, status: Arc<dyn StatusSink>) -> Self {
        Self {
            settings,
            fetcher,
            status,
            cancel: CancellationFlag::new(),
        }
    }

    /// Uses `cancel` to stop the dispatch early.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Runs the whole pipeline over the URLs read from `lines`.
    ///
    /// Neither the output directory nor the outcome logs are touched unless
    /// at least one URL survives validation.
    ///
    /// # Errors
    ///
    /// Returns [`RunError`] if the input cannot be read, the output directory
    /// cannot be created, or the dispatcher reports an internal fault.
    /// Per-URL download failures are reported in the summary instead.
    pub async fn run(&self, lines: &mut dyn LineSource) -> Result<RunReport, RunError> {
        let urls = load_urls(lines).map_err(RunError::Input)?;
        self.run_urls(urls).await
    }

    /// Runs validation and dispatch over already loaded URLs.
    ///
    /// # Errors
    ///
    /// Same as [`Self::run`], minus input errors.
    #[instrument(skip_all, fields(urls = urls.len(), threads = self.settings.threads, audio_only = self.settings.audio_only))]
    pub async fn run_urls(&self, urls: Vec<String>) -> Result<RunReport, RunError> {
        let dispatcher = Dispatcher::new(
            self.settings.threads,
            self.settings.retry_policy(),
            Arc::clone(&self.fetcher),
            Arc::new(self.settings.result_logger()),
            Arc::clone(&self.status),
        )?
        .with_cancellation(self.cancel.clone());

        if urls.is_empty() {
            warn!("no URLs provided");
            return Ok(RunReport::NoUrls);
        }

        let total = urls.len();
        let valid = Validator::new(Arc::clone(&self.fetcher))
            .retain_valid(urls)
            .await;
        if valid.is_empty() {
            warn!(rejected = total, "all URLs failed validation");
            return Ok(RunReport::NoValidUrls { rejected: total });
        }

        let output_dir = &self.settings.output_dir;
        std::fs::create_dir_all(output_dir).map_err(|source| RunError::OutputDir {
            path: output_dir.clone(),
            source,
        })?;

        let options = Arc::new(self.settings.fetch_config());
        let tasks = Task::for_urls(valid, &options);
        info!(
            "Starting download of {} item(s) using {} thread(s)...",
            tasks.len(),
            dispatcher.concurrency()
        );

        let summary = dispatcher.run_all(tasks).await?;
        Ok(RunReport::Completed(summary))
    }
}
