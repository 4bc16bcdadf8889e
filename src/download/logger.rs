//! Append-only outcome logs.
//!
//! Every terminal task outcome becomes exactly one line in one of two plain
//! text files: successes in the downloaded log, exhausted tasks in the failed
//! log. Each record opens the file in append mode, writes the whole line with
//! a single call, and closes it again; no handle is held between records.
//! Records from concurrent workers are serialized through one async lock so
//! lines never interleave. Nothing is deduplicated.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use super::TaskOutcome;

/// Default file name of the downloaded log.
pub const DEFAULT_DOWNLOADED_LOG: &str = "downloaded.txt";

/// Default file name of the failed log.
pub const DEFAULT_FAILED_LOG: &str = "failed.txt";

/// Errors writing an outcome log.
#[derive(Debug, Error)]
pub enum LogError {
    /// The log file could not be opened or written.
    #[error("failed to append to {path}: {source}")]
    Io {
        /// The log file.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Writer for the downloaded and failed logs.
#[derive(Debug)]
pub struct ResultLogger {
    downloaded: PathBuf,
    failed: PathBuf,
    write_lock: Mutex<()>,
}

impl ResultLogger {
    /// Creates a logger appending to the given files.
    #[must_use]
    pub fn new(downloaded: impl Into<PathBuf>, failed: impl Into<PathBuf>) -> Self {
        Self {
            downloaded: downloaded.into(),
            failed: failed.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Creates a logger using the default file names inside `dir`.
    #[must_use]
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(DEFAULT_DOWNLOADED_LOG), dir.join(DEFAULT_FAILED_LOG))
    }

    #[must_use]
    pub fn downloaded_path(&self) -> &Path {
        &self.downloaded
    }

    #[must_use]
    pub fn failed_path(&self) -> &Path {
        &self.failed
    }

    /// Appends `url` to the downloaded log.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::Io`] if the file cannot be opened or written.
    pub async fn record_success(&self, url: &str) -> Result<(), LogError> {
        self.append_line(&self.downloaded, url).await
    }

    /// Appends `url` to the failed log.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::Io`] if the file cannot be opened or written.
    pub async fn record_failure(&self, url: &str) -> Result<(), LogError> {
        self.append_line(&self.failed, url).await
    }

    /// Appends the outcome's URL to the log matching its kind.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::Io`] if the file cannot be opened or written.
    pub async fn record(&self, outcome: &TaskOutcome) -> Result<(), LogError> {
        match outcome {
            TaskOutcome::Downloaded { url, .. } => self.record_success(url).await,
            TaskOutcome::Failed { url, .. } => self.record_failure(url).await,
        }
    }

    #[instrument(level = "debug", skip(self))]
    async fn append_line(&self, path: &Path, url: &str) -> Result<(), LogError> {
        let mut line = String::with_capacity(url.len() + 1);
        line.push_str(url);
        line.push('\n');

        let _guard = self.write_lock.lock().await;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|source| LogError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|source| LogError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        // tokio::fs::File finishes writes in the background until flushed
        file.flush().await.map_err(|source| LogError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        debug!("outcome recorded");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use tempfile::TempDir;
    use tokio::task::JoinSet;

    use super::*;

    fn read_lines(path: &Path) -> Vec<String> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[tokio::test]
    async fn test_record_success_appends_line() {
        let dir = TempDir::new().unwrap();
        let logger = ResultLogger::in_dir(dir.path());

        logger.record_success("https://example.com/a").await.unwrap();
        logger.record_success("https://example.com/b").await.unwrap();

        assert_eq!(
            read_lines(logger.downloaded_path()),
            vec!["https://example.com/a", "https://example.com/b"]
        );
        assert!(!logger.failed_path().exists());
    }

    #[tokio::test]
    async fn test_record_failure_goes_to_failed_log() {
        let dir = TempDir::new().unwrap();
        let logger = ResultLogger::in_dir(dir.path());

        logger.record_failure("https://example.com/broken").await.unwrap();

        assert_eq!(
            read_lines(logger.failed_path()),
            vec!["https://example.com/broken"]
        );
        assert!(!logger.downloaded_path().exists());
    }

    #[tokio::test]
    async fn test_record_routes_by_outcome() {
        let dir = TempDir::new().unwrap();
        let logger = ResultLogger::in_dir(dir.path());

        logger
            .record(&TaskOutcome::Downloaded {
                url: "u1".to_string(),
                attempts: 1,
            })
            .await
            .unwrap();
        logger
            .record(&TaskOutcome::Failed {
                url: "u2".to_string(),
                reason: "gone".to_string(),
                attempts: 3,
            })
            .await
            .unwrap();

        assert_eq!(read_lines(logger.downloaded_path()), vec!["u1"]);
        assert_eq!(read_lines(logger.failed_path()), vec!["u2"]);
    }

    #[tokio::test]
    async fn test_existing_content_is_kept_and_duplicates_allowed() {
        let dir = TempDir::new().unwrap();
        let logger = ResultLogger::in_dir(dir.path());
        std::fs::write(logger.downloaded_path(), "earlier-run\n").unwrap();

        logger.record_success("earlier-run").await.unwrap();

        assert_eq!(
            read_lines(logger.downloaded_path()),
            vec!["earlier-run", "earlier-run"]
        );
    }

    #[tokio::test]
    async fn test_missing_parent_directory_is_io_error() {
        let dir = TempDir::new().unwrap();
        let logger = ResultLogger::in_dir(&dir.path().join("does-not-exist"));

        let error = logger.record_success("u1").await.unwrap_err();
        assert!(error.to_string().contains("downloaded.txt"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_records_produce_whole_lines() {
        const WRITERS: usize = 32;

        let dir = TempDir::new().unwrap();
        let logger = Arc::new(ResultLogger::in_dir(dir.path()));
        let padding = "x".repeat(4096);

        let mut writers = JoinSet::new();
        for n in 0..WRITERS {
            let logger = Arc::clone(&logger);
            let url = format!("https://example.com/{n}/{padding}");
            writers.spawn(async move { logger.record_success(&url).await.unwrap() });
        }
        while let Some(joined) = writers.join_next().await {
            joined.unwrap();
        }

        let lines = read_lines(logger.downloaded_path());
        assert_eq!(lines.len(), WRITERS);
        let expected: HashSet<String> = (0..WRITERS)
            .map(|n| format!("https://example.com/{n}/{padding}"))
            .collect();
        let actual: HashSet<String> = lines.into_iter().collect();
        assert_eq!(actual, expected);
    }
}
