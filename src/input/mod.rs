//! Pull-based sources of raw URL lines.
//!
//! A [`LineSource`] yields one line at a time until the input ends.
//! [`ReaderLineSource`] reads any buffered reader (a URL file), while
//! [`TerminalLineSource`] prompts interactively and also ends when the user
//! types the sentinel `done`.

use std::fs::File;
use std::io::{self, BufRead, BufReader, StdinLock, Stdout, Write};
use std::path::Path;

use tracing::debug;

/// Token that ends interactive entry (case-insensitive).
pub const DONE_SENTINEL: &str = "done";

/// Source of raw input lines.
pub trait LineSource {
    /// Returns the next line without its line terminator, or `None` at the
    /// end of input.
    ///
    /// # Errors
    ///
    /// Returns the underlying IO error if reading fails.
    fn next_line(&mut self) -> io::Result<Option<String>>;
}

/// Line source over any buffered reader.
#[derive(Debug)]
pub struct ReaderLineSource<R> {
    reader: R,
}

impl<R: BufRead> ReaderLineSource<R> {
    #[must_use]
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl ReaderLineSource<BufReader<File>> {
    /// Opens a URL file.
    ///
    /// # Errors
    ///
    /// Returns the IO error if the file cannot be opened.
    pub fn open(path: &Path) -> io::Result<Self> {
        debug!(path = %path.display(), "reading URLs from file");
        Ok(Self::new(BufReader::new(File::open(path)?)))
    }
}

impl<R: BufRead> LineSource for ReaderLineSource<R> {
    fn next_line(&mut self) -> io::Result<Option<String>> {
        read_line(&mut self.reader)
    }
}

/// Interactive line source.
///
/// Prints a header once and a `> ` prompt before each line. Ends at the
/// sentinel or at end of input.
#[derive(Debug)]
pub struct TerminalLineSource<R, W> {
    input: R,
    output: W,
    header_shown: bool,
    finished: bool,
}

impl<R: BufRead, W: Write> TerminalLineSource<R, W> {
    #[must_use]
    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            header_shown: false,
            finished: false,
        }
    }
}

impl TerminalLineSource<StdinLock<'static>, Stdout> {
    /// Prompts on stdout and reads stdin.
    #[must_use]
    pub fn stdin() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> LineSource for TerminalLineSource<R, W> {
    fn next_line(&mut self) -> io::Result<Option<String>> {
        if self.finished {
            return Ok(None);
        }
        if !self.header_shown {
            writeln!(
                self.output,
                "🔗 Enter URLs (type '{DONE_SENTINEL}' to finish):"
            )?;
            self.header_shown = true;
        }
        write!(self.output, "> ")?;
        self.output.flush()?;

        let line = read_line(&mut self.input)?;
        match line {
            Some(line) if line.trim().eq_ignore_ascii_case(DONE_SENTINEL) => {
                self.finished = true;
                Ok(None)
            }
            None => {
                self.finished = true;
                Ok(None)
            }
            some => Ok(some),
        }
    }
}

fn read_line<R: BufRead>(reader: &mut R) -> io::Result<Option<String>> {
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    let trimmed_len = line.trim_end_matches(['\r', '\n']).len();
    line.truncate(trimmed_len);
    Ok(Some(line))
}

/// Drains `source` into a URL list: lines are trimmed and blank lines skipped.
///
/// # Errors
///
/// Returns the first IO error raised by the source.
pub fn load_urls(source: &mut dyn LineSource) -> io::Result<Vec<String>> {
    let mut urls = Vec::new();
    while let Some(line) = source.next_line()? {
        let url = line.trim();
        if !url.is_empty() {
            urls.push(url.to_string());
        }
    }
    debug!(count = urls.len(), "loaded URLs");
    Ok(urls)
}
