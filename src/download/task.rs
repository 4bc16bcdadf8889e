//! Task and outcome types flowing through the dispatcher.

use std::fmt;
use std::sync::Arc;

use crate::fetch::{FetchConfig, FetchError};

/// One URL scheduled for download.
///
/// Immutable once created and consumed exactly once by a worker.
#[derive(Debug, Clone)]
pub struct Task {
    url: String,
    options: Arc<FetchConfig>,
}

impl Task {
    /// Creates a task sharing the run's fetch options.
    #[must_use]
    pub fn new(url: impl Into<String>, options: Arc<FetchConfig>) -> Self {
        Self {
            url: url.into(),
            options,
        }
    }

    /// Builds one task per URL, all sharing `options`.
    #[must_use]
    pub fn for_urls<I, S>(urls: I, options: &Arc<FetchConfig>) -> Vec<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        urls.into_iter()
            .map(|url| Self::new(url, Arc::clone(options)))
            .collect()
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn options(&self) -> &FetchConfig {
        &self.options
    }
}

/// Result of a single fetch attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptResult {
    /// The attempt completed.
    Success,
    /// The attempt failed and may be retried.
    TransientFailure(String),
    /// The attempt failed and retrying cannot help. Never derived from a
    /// [`FetchError`]: every fetch error is retried up to the cap.
    Fatal(String),
}

impl From<Result<(), FetchError>> for AttemptResult {
    fn from(result: Result<(), FetchError>) -> Self {
        match result {
            Ok(()) => Self::Success,
            Err(error) => Self::TransientFailure(error.to_string()),
        }
    }
}

/// Terminal result of a task: no further attempts follow.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TaskOutcome {
    /// The URL was fetched.
    Downloaded {
        /// The task's URL.
        url: String,
        /// Attempts made, including the successful one.
        attempts: u32,
    },
    /// Every permitted attempt failed.
    Failed {
        /// The task's URL.
        url: String,
        /// Reason reported by the last attempt.
        reason: String,
        /// Attempts made.
        attempts: u32,
    },
}

impl TaskOutcome {
    #[must_use]
    pub fn url(&self) -> &str {
        match self {
            Self::Downloaded { url, .. } | Self::Failed { url, .. } => url,
        }
    }

    #[must_use]
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Downloaded { attempts, .. } | Self::Failed { attempts, .. } => *attempts,
        }
    }

    #[must_use]
    pub fn is_downloaded(&self) -> bool {
        matches!(self, Self::Downloaded { .. })
    }
}

impl fmt::Display for TaskOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Downloaded { url, attempts } => {
                write!(f, "downloaded {url} ({attempts} attempt(s))")
            }
            Self::Failed {
                url,
                reason,
                attempts,
            } => write!(f, "failed {url} after {attempts} attempt(s): {reason}"),
        }
    }
}
