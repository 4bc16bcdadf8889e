//! Shared test fetcher with scripted per-URL behaviour.
//!
//! Lets integration tests drive the dispatcher and orchestrator without a
//! real fetch program, and count how often each URL was probed or fetched.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use mediagrab_core::fetch::{FetchConfig, FetchError, Fetcher, MediaInfo};
use mediagrab_core::progress::{ProgressReporter, ProgressUpdate};

/// What a fetch attempt for a URL does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behaviour {
    /// Every attempt succeeds.
    Succeed,
    /// Every attempt fails with a non-zero exit.
    Fail,
    /// Attempts fail until the given 1-based attempt, which succeeds.
    SucceedOnAttempt(u32),
    /// The attempt panics.
    Panic,
}

/// In-memory fetcher following a per-URL script.
#[derive(Debug, Default)]
pub struct ScriptedFetcher {
    behaviours: HashMap<String, Behaviour>,
    invalid: Vec<String>,
    fetch_calls: Mutex<HashMap<String, u32>>,
    probe_calls: Mutex<HashMap<String, u32>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the behaviour for `url`. Unscripted URLs succeed.
    pub fn with(mut self, url: &str, behaviour: Behaviour) -> Self {
        self.behaviours.insert(url.to_string(), behaviour);
        self
    }

    /// Makes the probe for `url` fail.
    pub fn with_invalid(mut self, url: &str) -> Self {
        self.invalid.push(url.to_string());
        self
    }

    pub fn fetch_calls(&self, url: &str) -> u32 {
        self.fetch_calls
            .lock()
            .unwrap()
            .get(url)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_fetch_calls(&self) -> u32 {
        self.fetch_calls.lock().unwrap().values().sum()
    }

    pub fn probe_calls(&self, url: &str) -> u32 {
        self.probe_calls
            .lock()
            .unwrap()
            .get(url)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn probe(&self, url: &str) -> Result<MediaInfo, FetchError> {
        *self
            .probe_calls
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default() += 1;
        if self.invalid.iter().any(|invalid| invalid == url) {
            return Err(FetchError::exited(url, Some(1), "ERROR: Unsupported URL"));
        }
        Ok(MediaInfo {
            title: Some(format!("title of {url}")),
            ..MediaInfo::default()
        })
    }

    async fn fetch(
        &self,
        url: &str,
        _config: &FetchConfig,
        progress: &dyn ProgressReporter,
    ) -> Result<(), FetchError> {
        let attempt = {
            let mut calls = self.fetch_calls.lock().unwrap();
            let count = calls.entry(url.to_string()).or_default();
            *count += 1;
            *count
        };
        tokio::task::yield_now().await;

        match self.behaviours.get(url).copied().unwrap_or(Behaviour::Succeed) {
            Behaviour::Succeed => {
                progress.update(&ProgressUpdate::new("100.0%", "1.00MiB/s", "00:00"));
                Ok(())
            }
            Behaviour::Fail => Err(FetchError::exited(url, Some(1), "HTTP Error 404: Not Found")),
            Behaviour::SucceedOnAttempt(n) if attempt >= n => Ok(()),
            Behaviour::SucceedOnAttempt(_) => {
                Err(FetchError::exited(url, Some(1), "Connection reset by peer"))
            }
            Behaviour::Panic => panic!("scripted panic for {url}"),
        }
    }
}

/// Reads a log file into lines; a missing file reads as empty.
pub fn read_log(path: &std::path::Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .map(|content| content.lines().map(str::to_string).collect())
        .unwrap_or_default()
}
