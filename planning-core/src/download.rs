//! Feed downloads.
//!
//! [`Downloader`] fetches every address of a group concurrently, retrying
//! each one a bounded number of times. The network side lives behind the
//! [`Fetch`] trait; [`HttpFetcher`] is the reqwest implementation and keeps
//! the last payload of every address to answer conditional requests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use reqwest::StatusCode;
use reqwest::header::{ETAG, HeaderName, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED};
use tracing::{debug, warn};

use crate::config::UpdaterSettings;
use crate::error::DownloadError;

const CALENDAR_MARKER: &str = "BEGIN:VCALENDAR";

/// Retrieve the raw text behind one address.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, DownloadError>;
}

#[async_trait]
impl<T: Fetch + ?Sized> Fetch for Arc<T> {
    async fn fetch(&self, url: &str) -> Result<String, DownloadError> {
        self.as_ref().fetch(url).await
    }
}

#[derive(Debug, Clone)]
struct CachedFeed {
    etag: Option<String>,
    last_modified: Option<String>,
    body: String,
}

/// HTTP fetcher with a last-fetch cache.
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
    cache: Mutex<HashMap<String, CachedFeed>>,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Self {
        HttpFetcher {
            client: reqwest::Client::new(),
            timeout,
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn cached(&self, url: &str) -> Option<CachedFeed> {
        self.cache.lock().ok()?.get(url).cloned()
    }

    fn remember(&self, url: &str, entry: CachedFeed) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(url.to_string(), entry);
        }
    }

    fn map_error(&self, url: &str, err: reqwest::Error) -> DownloadError {
        if err.is_timeout() {
            DownloadError::Timeout {
                url: url.to_string(),
                seconds: self.timeout.as_secs(),
            }
        } else {
            DownloadError::Unreachable {
                url: url.to_string(),
                reason: err.to_string(),
            }
        }
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, DownloadError> {
        let cached = self.cached(url);

        let mut request = self.client.get(url).timeout(self.timeout);
        if let Some(entry) = &cached {
            if let Some(etag) = &entry.etag {
                request = request.header(IF_NONE_MATCH, etag);
            }
            if let Some(last_modified) = &entry.last_modified {
                request = request.header(IF_MODIFIED_SINCE, last_modified);
            }
        }

        let response = request.send().await.map_err(|e| self.map_error(url, e))?;

        if response.status() == StatusCode::NOT_MODIFIED {
            if let Some(entry) = cached {
                debug!(%url, "not modified, using cached payload");
                return Ok(entry.body);
            }
        }
        if !response.status().is_success() {
            return Err(DownloadError::Http {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let header = |name: HeaderName| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(String::from)
        };
        let etag = header(ETAG);
        let last_modified = header(LAST_MODIFIED);

        let body = response.text().await.map_err(|e| self.map_error(url, e))?;
        if !looks_like_calendar(&body) {
            return Err(DownloadError::NotCalendar {
                url: url.to_string(),
            });
        }

        if etag.is_some() || last_modified.is_some() {
            self.remember(
                url,
                CachedFeed {
                    etag,
                    last_modified,
                    body: body.clone(),
                },
            );
        }

        Ok(body)
    }
}

fn looks_like_calendar(body: &str) -> bool {
    body.trim_start_matches('\u{feff}')
        .trim_start()
        .starts_with(CALENDAR_MARKER)
}

/// Outcome of downloading every address of a group.
#[derive(Debug, Default)]
pub struct GroupDownload {
    /// Payloads of the addresses that succeeded, in configuration order.
    pub payloads: Vec<String>,
    pub failures: Vec<DownloadError>,
}

impl GroupDownload {
    /// True when not a single address could be fetched.
    pub fn is_failure(&self) -> bool {
        self.payloads.is_empty()
    }
}

/// Retry policy applied to every address.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl From<&UpdaterSettings> for RetryPolicy {
    fn from(settings: &UpdaterSettings) -> Self {
        RetryPolicy {
            attempts: settings.download_attempts.max(1),
            delay: settings.retry_delay(),
        }
    }
}

pub struct Downloader<F> {
    fetcher: F,
    policy: RetryPolicy,
}

impl<F: Fetch> Downloader<F> {
    pub fn new(fetcher: F, policy: RetryPolicy) -> Self {
        Downloader { fetcher, policy }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Fetch all addresses concurrently.
    pub async fn download_group(&self, group: &str, addresses: &[String]) -> GroupDownload {
        let results = join_all(
            addresses
                .iter()
                .map(|address| self.fetch_with_retry(group, address)),
        )
        .await;

        let mut download = GroupDownload::default();
        for result in results {
            match result {
                Ok(payload) => download.payloads.push(payload),
                Err(err) => download.failures.push(err),
            }
        }
        download
    }

    async fn fetch_with_retry(&self, group: &str, address: &str) -> Result<String, DownloadError> {
        let mut attempt = 1;
        loop {
            debug!(%group, %address, attempt, "downloading");
            match self.fetcher.fetch(address).await {
                Ok(payload) => return Ok(payload),
                Err(err) if attempt < self.policy.attempts => {
                    warn!(%group, %address, attempt, max_attempts = self.policy.attempts, error = %err, "download failed, retrying");
                    tokio::time::sleep(self.policy.delay * attempt).await;
                    attempt += 1;
                }
                Err(err) => {
                    warn!(%group, %address, attempts = attempt, error = %err, "giving up on address");
                    return Err(err);
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted fetcher for controller tests.

    use super::*;
    use std::collections::VecDeque;

    #[derive(Default)]
    pub struct ScriptedFetcher {
        responses: Mutex<HashMap<String, VecDeque<Result<String, DownloadError>>>>,
        fallback: Mutex<HashMap<String, Result<String, DownloadError>>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedFetcher {
        /// Every call to `url` returns `response` until changed.
        pub fn always(&self, url: &str, response: Result<String, DownloadError>) {
            self.fallback.lock().unwrap().insert(url.to_string(), response);
        }

        /// The next call to `url` returns `response`.
        pub fn once(&self, url: &str, response: Result<String, DownloadError>) {
            self.responses
                .lock()
                .unwrap()
                .entry(url.to_string())
                .or_default()
                .push_back(response);
        }

        pub fn calls_to(&self, url: &str) -> usize {
            self.calls.lock().unwrap().iter().filter(|u| *u == url).count()
        }
    }

    #[async_trait]
    impl Fetch for ScriptedFetcher {
        async fn fetch(&self, url: &str) -> Result<String, DownloadError> {
            self.calls.lock().unwrap().push(url.to_string());
            if let Some(response) = self
                .responses
                .lock()
                .unwrap()
                .get_mut(url)
                .and_then(VecDeque::pop_front)
            {
                return response;
            }
            self.fallback
                .lock()
                .unwrap()
                .get(url)
                .cloned()
                .unwrap_or_else(|| {
                    Err(DownloadError::Unreachable {
                        url: url.to_string(),
                        reason: "no scripted response".into(),
                    })
                })
        }
    }
}
