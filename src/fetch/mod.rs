//! Boundary to the external media fetching engine.
//!
//! The engine is an opaque capability with two operations: a metadata-only
//! [`probe`](Fetcher::probe) used for validation, and a full
//! [`fetch`](Fetcher::fetch) that transfers and post-processes media while
//! reporting progress. Format selection and container merging are the
//! engine's business; this crate only hands it a [`FetchConfig`].
//!
//! [`YtDlpFetcher`] drives a `yt-dlp` compatible program as a child process.

mod config;
mod error;
mod ytdlp;

use async_trait::async_trait;
use serde::Deserialize;

use crate::progress::ProgressReporter;

pub use config::{
    AudioExtraction, DEFAULT_ARCHIVE_FILE, DEFAULT_AUDIO_CODEC, DEFAULT_AUDIO_QUALITY,
    DEFAULT_MERGE_CONTAINER, FetchConfig, MediaMode,
};
pub use error::FetchError;
pub use ytdlp::{DEFAULT_FETCHER_PROGRAM, YtDlpFetcher, parse_progress_line};

/// Metadata returned by a successful probe.
///
/// Only the fields used for logging are kept; everything else the engine
/// reports is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MediaInfo {
    /// Item or playlist title.
    pub title: Option<String>,
    /// Uploader or channel name.
    pub uploader: Option<String>,
    /// Engine-specific item kind (`video`, `playlist`, ...).
    #[serde(rename = "_type")]
    pub kind: Option<String>,
}

/// The external fetch capability.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Resolves metadata for `url` without transferring any media.
    async fn probe(&self, url: &str) -> Result<MediaInfo, FetchError>;

    /// Performs one full fetch attempt for `url`.
    ///
    /// Progress ticks are forwarded to `progress` while data is moving.
    async fn fetch(
        &self,
        url: &str,
        config: &FetchConfig,
        progress: &dyn ProgressReporter,
    ) -> Result<(), FetchError>;
}
