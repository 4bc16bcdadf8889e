use anyhow::{Result, anyhow, bail};
use clap::{ArgMatches, CommandFactory, FromArgMatches, parser::ValueSource};
use mediagrab_core::{Settings, YtDlpFetcher};

use crate::app_config::FileConfig;
use crate::cli::Args;

/// Which arguments were given explicitly on the command line.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct CliValueSources {
    pub(crate) dir: bool,
    pub(crate) threads: bool,
    pub(crate) max_retries: bool,
    pub(crate) audio: bool,
    pub(crate) fetcher: bool,
    pub(crate) archive_file: bool,
}

pub(crate) fn parse_cli_with_sources() -> (Args, CliValueSources) {
    let matches = Args::command().get_matches();
    let args = Args::from_arg_matches(&matches).unwrap_or_else(|err| err.exit());
    let sources = sources_from_matches(&matches);
    (args, sources)
}

fn sources_from_matches(matches: &ArgMatches) -> CliValueSources {
    CliValueSources {
        dir: is_commandline_value(matches, "dir"),
        threads: is_commandline_value(matches, "threads"),
        max_retries: is_commandline_value(matches, "max_retries"),
        audio: is_commandline_value(matches, "audio"),
        fetcher: is_commandline_value(matches, "fetcher"),
        archive_file: is_commandline_value(matches, "archive_file"),
    }
}

fn is_commandline_value(matches: &ArgMatches, id: &str) -> bool {
    matches.value_source(id) == Some(ValueSource::CommandLine)
}

/// Fills arguments not given on the command line from the config file.
pub(crate) fn apply_config_defaults(
    mut args: Args,
    cli_sources: &CliValueSources,
    file_config: Option<&FileConfig>,
) -> Result<Args> {
    if let Some(file_config) = file_config {
        if !cli_sources.dir
            && let Some(output_dir) = &file_config.output_dir
        {
            args.dir = Some(output_dir.clone());
        }

        if !cli_sources.threads
            && let Some(threads) = file_config.threads
        {
            args.threads = threads;
        }

        if !cli_sources.max_retries
            && let Some(max_retries) = file_config.max_retries
        {
            args.max_retries = max_retries;
        }

        if !cli_sources.audio
            && let Some(audio) = file_config.audio
        {
            args.audio = audio;
        }

        if !cli_sources.fetcher
            && let Some(fetcher) = &file_config.fetcher
        {
            args.fetcher = fetcher.clone();
        }

        if !cli_sources.archive_file
            && let Some(archive_file) = &file_config.archive_file
        {
            args.archive_file = Some(archive_file.clone());
        }
    }

    if !(1..=64).contains(&args.threads) {
        bail!(
            "Invalid effective threads value: {}. Expected range: 1..=64",
            args.threads
        );
    }
    if !(1..=10).contains(&args.max_retries) {
        bail!(
            "Invalid effective max_retries value: {}. Expected range: 1..=10",
            args.max_retries
        );
    }

    Ok(args)
}

/// Resolves run settings from the merged arguments.
pub(crate) fn build_settings(args: &Args) -> Settings {
    let mut settings = Settings {
        threads: usize::from(args.threads),
        max_retries: u32::from(args.max_retries),
        audio_only: args.audio,
        ..Settings::default()
    };
    if let Some(dir) = &args.dir {
        settings.output_dir.clone_from(dir);
    }
    if let Some(archive_file) = &args.archive_file {
        settings.archive_file.clone_from(archive_file);
    }
    settings
}

pub(crate) fn build_fetcher(args: &Args) -> Result<YtDlpFetcher> {
    YtDlpFetcher::from_command_line(&args.fetcher)
        .ok_or_else(|| anyhow!("Invalid fetcher command: must not be empty"))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn parse(argv: &[&str]) -> (Args, CliValueSources) {
        let matches = Args::command()
            .try_get_matches_from(argv)
            .expect("arguments should parse");
        let args = Args::from_arg_matches(&matches).expect("arguments should convert");
        (args, sources_from_matches(&matches))
    }

    fn file_config() -> FileConfig {
        FileConfig {
            output_dir: Some(PathBuf::from("from-config")),
            threads: Some(6),
            max_retries: Some(5),
            audio: Some(true),
            fetcher: Some("python3 -m yt_dlp".to_string()),
            archive_file: Some(PathBuf::from("config-archive.txt")),
        }
    }

    #[test]
    fn test_sources_only_mark_explicit_values() {
        let (_, sources) = parse(&["mediagrab", "--threads", "4", "--audio"]);
        assert!(sources.threads);
        assert!(sources.audio);
        assert!(!sources.max_retries);
        assert!(!sources.dir);
        assert!(!sources.fetcher);
    }

    #[test]
    fn test_config_fills_unset_values() {
        let (args, sources) = parse(&["mediagrab"]);
        let args = apply_config_defaults(args, &sources, Some(&file_config()))
            .expect("config defaults should apply");

        assert_eq!(args.dir, Some(PathBuf::from("from-config")));
        assert_eq!(args.threads, 6);
        assert_eq!(args.max_retries, 5);
        assert!(args.audio);
        assert_eq!(args.fetcher, "python3 -m yt_dlp");
        assert_eq!(args.archive_file, Some(PathBuf::from("config-archive.txt")));
    }

    #[test]
    fn test_command_line_overrides_config() {
        let (args, sources) = parse(&[
            "mediagrab",
            "--dir",
            "from-cli",
            "--threads",
            "3",
            "--fetcher",
            "yt-dlp",
        ]);
        let args = apply_config_defaults(args, &sources, Some(&file_config()))
            .expect("config defaults should apply");

        assert_eq!(args.dir, Some(PathBuf::from("from-cli")));
        assert_eq!(args.threads, 3);
        assert_eq!(args.fetcher, "yt-dlp");
        assert_eq!(args.max_retries, 5);
    }

    #[test]
    fn test_no_config_keeps_cli_defaults() {
        let (args, sources) = parse(&["mediagrab"]);
        let args = apply_config_defaults(args, &sources, None).expect("defaults are valid");
        assert_eq!(args.threads, 2);
        assert_eq!(args.max_retries, 3);
        assert!(args.dir.is_none());
    }

    #[test]
    fn test_build_settings_defaults() {
        let (args, _) = parse(&["mediagrab"]);
        let settings = build_settings(&args);
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_build_settings_from_args() {
        let (args, _) = parse(&[
            "mediagrab",
            "--audio",
            "--dir",
            "music",
            "-t",
            "8",
            "-r",
            "1",
            "--archive-file",
            "seen.txt",
        ]);
        let settings = build_settings(&args);
        assert!(settings.audio_only);
        assert_eq!(settings.output_dir, PathBuf::from("music"));
        assert_eq!(settings.threads, 8);
        assert_eq!(settings.max_retries, 1);
        assert_eq!(settings.archive_file, PathBuf::from("seen.txt"));
    }

    #[test]
    fn test_build_fetcher_splits_command_line() {
        let (args, _) = parse(&["mediagrab", "--fetcher", "python3 -m yt_dlp"]);
        let fetcher = build_fetcher(&args).expect("fetcher should build");
        assert_eq!(fetcher.program(), std::path::Path::new("python3"));
    }

    #[test]
    fn test_build_fetcher_rejects_blank_command() {
        let (args, _) = parse(&["mediagrab", "--fetcher", "   "]);
        assert!(build_fetcher(&args).is_err());
    }
}
