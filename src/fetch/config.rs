//! Shared, read-only options for every fetch in a run.

use std::path::{Path, PathBuf};

/// Default container used when separate video and audio streams are merged.
pub const DEFAULT_MERGE_CONTAINER: &str = "mp4";

/// Default idempotency record managed by the fetcher.
pub const DEFAULT_ARCHIVE_FILE: &str = "archive.txt";

/// Default codec for the audio-extraction post-step.
pub const DEFAULT_AUDIO_CODEC: &str = "mp3";

/// Default quality for the audio-extraction post-step.
pub const DEFAULT_AUDIO_QUALITY: &str = "192K";

/// Hierarchical output layout below the output directory.
const OUTPUT_LAYOUT: [&str; 3] = ["%(uploader)s", "%(playlist_title)s", "%(title)s.%(ext)s"];

/// What kind of media to fetch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MediaMode {
    /// Best video merged with best audio.
    #[default]
    Video,
    /// Best audio stream only, followed by audio extraction.
    AudioOnly,
}

impl MediaMode {
    /// Format selector handed to the fetcher.
    #[must_use]
    pub fn format_selector(self) -> &'static str {
        match self {
            Self::Video => "bestvideo+bestaudio/best",
            Self::AudioOnly => "bestaudio/best",
        }
    }
}

/// Audio-extraction post-step settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioExtraction {
    /// Target codec (e.g. `mp3`).
    pub codec: String,
    /// Target quality (e.g. `192K`).
    pub quality: String,
}

impl Default for AudioExtraction {
    fn default() -> Self {
        Self {
            codec: DEFAULT_AUDIO_CODEC.to_string(),
            quality: DEFAULT_AUDIO_QUALITY.to_string(),
        }
    }
}

/// Download and transcode options shared by all tasks of a run.
///
/// Built once before dispatch and then only read; tasks hold it behind an
/// `Arc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    output_template: String,
    media_mode: MediaMode,
    merge_container: String,
    archive_file: PathBuf,
    ignore_errors: bool,
    allow_playlists: bool,
    audio_extraction: Option<AudioExtraction>,
}

impl FetchConfig {
    /// Creates a config writing below `output_dir` in the given mode.
    ///
    /// Audio-only mode enables the default audio-extraction post-step.
    #[must_use]
    pub fn new(output_dir: &Path, media_mode: MediaMode) -> Self {
        let audio_extraction = match media_mode {
            MediaMode::AudioOnly => Some(AudioExtraction::default()),
            MediaMode::Video => None,
        };
        Self {
            output_template: output_template(output_dir),
            media_mode,
            merge_container: DEFAULT_MERGE_CONTAINER.to_string(),
            archive_file: PathBuf::from(DEFAULT_ARCHIVE_FILE),
            ignore_errors: true,
            allow_playlists: true,
            audio_extraction,
        }
    }

    /// Sets the archive file.
    #[must_use]
    pub fn with_archive_file(mut self, archive_file: impl Into<PathBuf>) -> Self {
        self.archive_file = archive_file.into();
        self
    }

    /// Sets the merge container.
    #[must_use]
    pub fn with_merge_container(mut self, container: impl Into<String>) -> Self {
        self.merge_container = container.into();
        self
    }

    /// Overrides the audio-extraction settings. Ignored in video mode.
    #[must_use]
    pub fn with_audio_extraction(mut self, extraction: AudioExtraction) -> Self {
        if self.media_mode == MediaMode::AudioOnly {
            self.audio_extraction = Some(extraction);
        }
        self
    }

    #[must_use]
    pub fn output_template(&self) -> &str {
        &self.output_template
    }

    #[must_use]
    pub fn media_mode(&self) -> MediaMode {
        self.media_mode
    }

    #[must_use]
    pub fn merge_container(&self) -> &str {
        &self.merge_container
    }

    #[must_use]
    pub fn archive_file(&self) -> &Path {
        &self.archive_file
    }

    #[must_use]
    pub fn ignore_errors(&self) -> bool {
        self.ignore_errors
    }

    #[must_use]
    pub fn allow_playlists(&self) -> bool {
        self.allow_playlists
    }

    #[must_use]
    pub fn audio_extraction(&self) -> Option<&AudioExtraction> {
        self.audio_extraction.as_ref()
    }
}

/// `<dir>/%(uploader)s/%(playlist_title)s/%(title)s.%(ext)s`
fn output_template(output_dir: &Path) -> String {
    let mut path = output_dir.to_path_buf();
    for segment in OUTPUT_LAYOUT {
        path.push(segment);
    }
    path.to_string_lossy().into_owned()
}
