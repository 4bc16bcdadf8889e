//! Fetcher backed by a `yt-dlp` compatible program.
//!
//! Probes run the program in simulate mode and parse the JSON it prints.
//! Fetches run it with a progress template that emits one tagged line per
//! tick on stdout, which is parsed into [`ProgressUpdate`]s while stderr is
//! drained in parallel and kept for the failure message.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, instrument, trace};

use super::{FetchConfig, FetchError, Fetcher, MediaInfo};
use crate::progress::{ProgressReporter, ProgressUpdate};

/// Program run when no other fetcher is configured.
pub const DEFAULT_FETCHER_PROGRAM: &str = "yt-dlp";

/// Tag marking progress lines on the fetcher's stdout.
const PROGRESS_PREFIX: &str = "mediagrab-progress:";

/// Progress template: `<tag><percent>|<speed>|<eta>`, one line per tick.
const PROGRESS_TEMPLATE: &str = "download:mediagrab-progress:%(progress._percent_str)s|%(progress._speed_str)s|%(progress._eta_str)s";

/// Runs a `yt-dlp` compatible program as a child process.
#[derive(Debug, Clone)]
pub struct YtDlpFetcher {
    program: PathBuf,
    leading_args: Vec<OsString>,
}

impl Default for YtDlpFetcher {
    fn default() -> Self {
        Self::new(DEFAULT_FETCHER_PROGRAM)
    }
}

impl YtDlpFetcher {
    /// Creates a fetcher running `program`.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
        }
    }

    /// Adds arguments placed before every generated argument list
    /// (e.g. `python3 -m yt_dlp`).
    #[must_use]
    pub fn with_leading_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.leading_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Builds a fetcher from a whitespace separated command line such as
    /// `"python3 -m yt_dlp"`. Returns `None` for a blank command.
    #[must_use]
    pub fn from_command_line(command: &str) -> Option<Self> {
        let mut parts = command.split_whitespace();
        let program = parts.next()?;
        Some(Self::new(program).with_leading_args(parts))
    }

    /// The program this fetcher runs.
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.leading_args)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        command
    }

    fn program_name(&self) -> String {
        self.program.display().to_string()
    }
}

#[async_trait]
impl Fetcher for YtDlpFetcher {
    #[instrument(skip(self), fields(program = %self.program.display()))]
    async fn probe(&self, url: &str) -> Result<MediaInfo, FetchError> {
        let mut command = self.command();
        command.args(probe_args(url));
        let output = command
            .output()
            .await
            .map_err(|e| FetchError::spawn(self.program_name(), e))?;

        if !output.status.success() {
            return Err(FetchError::exited(
                url,
                output.status.code(),
                &String::from_utf8_lossy(&output.stderr),
            ));
        }

        let info: MediaInfo =
            serde_json::from_slice(&output.stdout).map_err(|e| FetchError::metadata(url, e))?;
        debug!(title = ?info.title, uploader = ?info.uploader, "probe succeeded");
        Ok(info)
    }

    #[instrument(skip(self, config, progress), fields(program = %self.program.display()))]
    async fn fetch(
        &self,
        url: &str,
        config: &FetchConfig,
        progress: &dyn ProgressReporter,
    ) -> Result<(), FetchError> {
        let mut command = self.command();
        command
            .args(fetch_args(url, config))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        let mut child = command
            .spawn()
            .map_err(|e| FetchError::spawn(self.program_name(), e))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| FetchError::io(url, io::Error::other("stdout was not captured")))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| FetchError::io(url, io::Error::other("stderr was not captured")))?;

        let pump_stdout = async {
            let mut segments = BufReader::new(stdout).split(b'\n');
            while let Some(segment) = segments.next_segment().await? {
                let line = String::from_utf8_lossy(&segment);
                match parse_progress_line(&line) {
                    Some(update) => progress.update(&update),
                    None => trace!(line = %line.trim_end(), "fetcher output"),
                }
            }
            Ok::<(), io::Error>(())
        };
        let drain_stderr = async {
            let mut buf = Vec::new();
            stderr.read_to_end(&mut buf).await.map(|_| buf)
        };

        let (pumped, drained) = tokio::join!(pump_stdout, drain_stderr);
        pumped.map_err(|e| FetchError::io(url, e))?;
        let stderr_bytes = drained.map_err(|e| FetchError::io(url, e))?;

        let status = child.wait().await.map_err(|e| FetchError::io(url, e))?;
        if status.success() {
            debug!("fetch finished");
            Ok(())
        } else {
            Err(FetchError::exited(
                url,
                status.code(),
                &String::from_utf8_lossy(&stderr_bytes),
            ))
        }
    }
}

fn probe_args(url: &str) -> Vec<OsString> {
    [
        "--dump-single-json",
        "--flat-playlist",
        "--no-warnings",
        "--",
        url,
    ]
    .into_iter()
    .map(OsString::from)
    .collect()
}

fn fetch_args(url: &str, config: &FetchConfig) -> Vec<OsString> {
    let mut args: Vec<OsString> = [
        "--quiet",
        "--no-warnings",
        "--progress",
        "--newline",
        "--progress-template",
        PROGRESS_TEMPLATE,
        "--output",
        config.output_template(),
        "--format",
        config.media_mode().format_selector(),
        "--merge-output-format",
        config.merge_container(),
    ]
    .into_iter()
    .map(OsString::from)
    .collect();

    args.push("--download-archive".into());
    args.push(config.archive_file().as_os_str().to_owned());

    if config.ignore_errors() {
        args.push("--ignore-errors".into());
    }
    args.push(if config.allow_playlists() {
        "--yes-playlist".into()
    } else {
        "--no-playlist".into()
    });

    if let Some(extraction) = config.audio_extraction() {
        args.push("--extract-audio".into());
        args.push("--audio-format".into());
        args.push(extraction.codec.clone().into());
        args.push("--audio-quality".into());
        args.push(extraction.quality.clone().into());
    }

    args.push("--".into());
    args.push(url.into());
    args
}

/// Parses one tagged progress line (`<tag><percent>|<speed>|<eta>`).
///
/// Returns `None` for any other output line.
#[must_use]
pub fn parse_progress_line(line: &str) -> Option<ProgressUpdate> {
    let cleaned = strip_ansi(line);
    let payload = cleaned.trim().strip_prefix(PROGRESS_PREFIX)?;
    let mut fields = payload.split('|').map(str::trim);
    let percent = fields.next()?;
    let speed = fields.next()?;
    let eta = fields.next()?;
    if percent.is_empty() {
        return None;
    }
    Some(ProgressUpdate::new(percent, speed, eta))
}

/// Removes ANSI CSI sequences (colour codes) from a line.
fn strip_ansi(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        if ch == '\u{1b}' {
            if chars.next() == Some('[') {
                for terminator in chars.by_ref() {
                    if ('@'..='~').contains(&terminator) {
                        break;
                    }
                }
            }
            continue;
        }
        out.push(ch);
    }
    out
}
