//! Error types for the fetch capability.

use thiserror::Error;

/// Maximum number of stderr lines kept on a failed run of the fetcher.
const STDERR_TAIL_LINES: usize = 5;

/// Errors produced by a probe or fetch attempt.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The fetcher program could not be started at all.
    #[error("failed to start fetcher `{program}`: {source}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// The underlying spawn error.
        #[source]
        source: std::io::Error,
    },

    /// The fetcher ran but reported failure for this URL.
    #[error("fetcher failed for {url} (exit code {}): {stderr}", display_exit_code(.code))]
    Exited {
        /// The URL being processed.
        url: String,
        /// Process exit code, `None` when killed by a signal.
        code: Option<i32>,
        /// Last lines the fetcher wrote to stderr.
        stderr: String,
    },

    /// Reading the fetcher's output streams failed.
    #[error("IO error talking to fetcher for {url}: {source}")]
    Io {
        /// The URL being processed.
        url: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Metadata returned by a probe could not be parsed.
    #[error("unreadable metadata for {url}: {source}")]
    Metadata {
        /// The URL being probed.
        url: String,
        /// The underlying parse error.
        #[source]
        source: serde_json::Error,
    },
}

impl FetchError {
    /// Creates a spawn error.
    pub fn spawn(program: impl Into<String>, source: std::io::Error) -> Self {
        Self::Spawn {
            program: program.into(),
            source,
        }
    }

    /// Creates an exit error, keeping only the tail of `stderr`.
    pub fn exited(url: impl Into<String>, code: Option<i32>, stderr: &str) -> Self {
        Self::Exited {
            url: url.into(),
            code,
            stderr: stderr_tail(stderr),
        }
    }

    /// Creates an IO error.
    pub fn io(url: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            url: url.into(),
            source,
        }
    }

    /// Creates a metadata parse error.
    pub fn metadata(url: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Metadata {
            url: url.into(),
            source,
        }
    }
}

#[allow(clippy::ref_option)]
fn display_exit_code(code: &Option<i32>) -> String {
    code.map_or_else(|| "none".to_string(), |code| code.to_string())
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join(" | ")
}
