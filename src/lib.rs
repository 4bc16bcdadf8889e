//! Mediagrab Core Library
//!
//! Batch media downloading: a list of URLs is validated, fetched
//! concurrently across a bounded worker pool with retry and exponential
//! backoff, and every terminal outcome is recorded in append-only logs.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`fetch`] - Boundary to the external fetch engine (`yt-dlp`)
//! - [`download`] - Tasks, retry policy, outcome logs and the worker pool
//! - [`input`] - File and interactive URL line sources
//! - [`validate`] - Metadata-only URL validation
//! - [`progress`] - Per-transfer status lines
//! - [`orchestrator`] - Settings and the end-to-end run driver

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod download;
pub mod fetch;
pub mod input;
pub mod orchestrator;
pub mod progress;
pub mod validate;

// Re-export commonly used types
pub use download::{
    CancellationFlag, DEFAULT_MAX_RETRIES, DEFAULT_THREADS, DispatchError, Dispatcher,
    ResultLogger, RetryPolicy, RunSummary, Task, TaskOutcome,
};
pub use fetch::{FetchConfig, FetchError, Fetcher, MediaMode, YtDlpFetcher};
pub use input::{LineSource, ReaderLineSource, TerminalLineSource, load_urls};
pub use orchestrator::{Orchestrator, RunError, RunReport, Settings};
pub use progress::{ConsoleStatus, NullStatus, StatusSink};
pub use validate::Validator;
