//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use mediagrab_core::fetch::DEFAULT_FETCHER_PROGRAM;
use mediagrab_core::{DEFAULT_MAX_RETRIES, DEFAULT_THREADS};

/// Batch download video or audio from a list of URLs.
///
/// URLs are read from a file, or entered one per line until `done`. Each URL
/// is validated, then downloaded with bounded concurrency and retried with
/// exponential backoff. Outcomes are appended to downloaded.txt and failed.txt.
#[derive(Parser, Debug, Clone)]
#[command(name = "mediagrab")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Download audio only and convert it to mp3
    #[arg(short, long)]
    pub audio: bool,

    /// Read URLs from this file instead of prompting
    #[arg(short, long, value_name = "PATH")]
    pub file: Option<PathBuf>,

    /// Output root directory [default: downloads]
    #[arg(short, long, value_name = "PATH")]
    pub dir: Option<PathBuf>,

    /// Concurrent downloads (1-64)
    #[arg(short, long, default_value_t = DEFAULT_THREADS as u8, value_parser = clap::value_parser!(u8).range(1..=64))]
    pub threads: u8,

    /// Attempts per URL before it is logged as failed (1-10)
    #[arg(short = 'r', long, default_value_t = DEFAULT_MAX_RETRIES as u8, value_parser = clap::value_parser!(u8).range(1..=10))]
    pub max_retries: u8,

    /// Fetch program, optionally followed by leading arguments
    #[arg(long, value_name = "COMMAND", default_value = DEFAULT_FETCHER_PROGRAM)]
    pub fetcher: String,

    /// Archive file used to skip items completed in earlier runs [default: archive.txt]
    #[arg(long, value_name = "PATH")]
    pub archive_file: Option<PathBuf>,

    /// Disable colored log output
    #[arg(long)]
    pub no_color: bool,
}
