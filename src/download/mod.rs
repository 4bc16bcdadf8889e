//! Concurrent download orchestration core.
//!
//! Turns a list of [`Task`]s into [`TaskOutcome`]s: a bounded pool of
//! workers ([`Dispatcher`]) runs each task through the retry policy
//! ([`attempt_with_retry`]) and records its terminal outcome in the
//! append-only logs ([`ResultLogger`]).
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use mediagrab_core::download::{Dispatcher, ResultLogger, RetryPolicy, Task};
//! use mediagrab_core::fetch::{FetchConfig, MediaMode, YtDlpFetcher};
//! use mediagrab_core::progress::NullStatus;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let options = Arc::new(FetchConfig::new(Path::new("downloads"), MediaMode::Video));
//! let tasks = Task::for_urls(["https://example.com/watch?v=1"], &options);
//! let dispatcher = Dispatcher::new(
//!     2,
//!     RetryPolicy::default(),
//!     Arc::new(YtDlpFetcher::default()),
//!     Arc::new(ResultLogger::in_dir(Path::new("."))),
//!     Arc::new(NullStatus),
//! )?;
//! let summary = dispatcher.run_all(tasks).await?;
//! println!("Downloaded: {}, Failed: {}", summary.downloaded(), summary.failed());
//! # Ok(())
//! # }
//! ```

mod cancel;
mod dispatcher;
mod logger;
mod retry;
mod task;

pub use cancel::CancellationFlag;
pub use dispatcher::{DEFAULT_THREADS, DispatchError, Dispatcher, RunSummary};
pub use logger::{DEFAULT_DOWNLOADED_LOG, DEFAULT_FAILED_LOG, LogError, ResultLogger};
pub use retry::{DEFAULT_BASE_DELAY, DEFAULT_MAX_RETRIES, RetryPolicy, attempt_with_retry};
pub use task::{AttemptResult, Task, TaskOutcome};
