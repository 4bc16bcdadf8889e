//! Pre-dispatch URL validation.
//!
//! A URL is valid when a metadata-only probe through the fetch capability
//! succeeds. Nothing is downloaded or persisted.

use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::fetch::Fetcher;

/// Filters URLs by probing them.
#[derive(Clone)]
pub struct Validator {
    fetcher: Arc<dyn Fetcher>,
}

impl std::fmt::Debug for Validator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Validator").finish_non_exhaustive()
    }
}

impl Validator {
    #[must_use]
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self { fetcher }
    }

    /// Returns `true` iff the probe for `url` completes without error.
    #[instrument(level = "debug", skip(self))]
    pub async fn validate(&self, url: &str) -> bool {
        match self.fetcher.probe(url).await {
            Ok(info) => {
                debug!(title = ?info.title, kind = ?info.kind, "probe succeeded");
                true
            }
            Err(error) => {
                debug!(error = %error, "probe failed");
                false
            }
        }
    }

    /// Keeps the URLs that pass [`Self::validate`], in input order.
    ///
    /// URLs are probed one after another.
    pub async fn retain_valid(&self, urls: Vec<String>) -> Vec<String> {
        let total = urls.len();
        let mut valid = Vec::with_capacity(total);
        for url in urls {
            if self.validate(&url).await {
                valid.push(url);
            }
        }
        info!(valid = valid.len(), rejected = total - valid.len(), "validation complete");
        valid
    }
}
