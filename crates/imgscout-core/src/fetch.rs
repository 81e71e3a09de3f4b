use std::borrow::Cow;
use std::time::Duration;

use rand::seq::IndexedRandom;
use url::Url;

use crate::error::AppError;
use crate::models::{PageRequest, Reference};
use crate::retry::RetryPolicy;
use crate::throttle::Throttle;
use crate::traits::{ImageExtractor, Transport};

/// Request timeout for target pages.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Request timeout for the session warm-up request.
pub const WARMUP_TIMEOUT: Duration = Duration::from_secs(15);

pub const DEFAULT_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_3) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:122.0) Gecko/20100101 Firefox/122.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:122.0) Gecko/20100101 Firefox/122.0",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
];

/// Headers sent with every page request, alongside the rotated User-Agent.
#[derive(Debug, Clone)]
pub struct HeaderProfile {
    pub accept: String,
    pub accept_language: String,
    /// Fixed Referer. When unset, the origin of the requested page is used.
    pub referer: Option<String>,
    pub extra: Vec<(String, String)>,
}

impl Default for HeaderProfile {
    fn default() -> Self {
        Self::browser()
    }
}

impl HeaderProfile {
    /// Header set of an ordinary desktop browser navigation.
    pub fn browser() -> Self {
        Self {
            accept: "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8".into(),
            accept_language: "en-US,en;q=0.9,de;q=0.8".into(),
            referer: None,
            extra: vec![
                ("Accept-Encoding".into(), "identity".into()),
                ("DNT".into(), "1".into()),
                ("Upgrade-Insecure-Requests".into(), "1".into()),
            ],
        }
    }

    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }

    fn headers_for(&self, url: &str) -> Vec<(String, String)> {
        let mut headers = vec![
            ("Accept".to_string(), self.accept.clone()),
            ("Accept-Language".to_string(), self.accept_language.clone()),
        ];
        if let Some(referer) = self.referer.clone().or_else(|| origin_of(url)) {
            headers.push(("Referer".to_string(), referer));
        }
        headers.extend(self.extra.iter().cloned());
        headers
    }
}

/// `scheme://host[:port]/` of a URL, if it parses.
pub fn origin_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    parsed.host_str()?;
    Some(format!("{}/", parsed.origin().ascii_serialization()))
}

/// Resolves one target to an image reference.
///
/// Owns the transport, and with it the session. Every failure is absorbed:
/// [`fetch`](Self::fetch) returns `None` rather than an error.
pub struct ImageFetcher<T, X>
where
    T: Transport,
    X: ImageExtractor,
{
    transport: T,
    extractor: X,
    throttle: Throttle,
    retry: RetryPolicy,
    user_agents: Vec<String>,
    headers: HeaderProfile,
    timeout: Duration,
}

impl<T, X> ImageFetcher<T, X>
where
    T: Transport,
    X: ImageExtractor,
{
    pub fn new(transport: T, extractor: X, throttle: Throttle) -> Self {
        Self {
            transport,
            extractor,
            throttle,
            retry: RetryPolicy::default(),
            user_agents: DEFAULT_USER_AGENTS.iter().map(|s| s.to_string()).collect(),
            headers: HeaderProfile::browser(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Replace the user-agent rotation. An empty list keeps the defaults.
    pub fn with_user_agents(mut self, user_agents: Vec<String>) -> Self {
        if !user_agents.is_empty() {
            self.user_agents = user_agents;
        }
        self
    }

    pub fn with_headers(mut self, headers: HeaderProfile) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn throttle(&self) -> &Throttle {
        &self.throttle
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    fn pick_user_agent(&self) -> String {
        self.user_agents
            .choose(&mut rand::rng())
            .cloned()
            .unwrap_or_else(|| DEFAULT_USER_AGENTS[0].to_string())
    }

    /// Build the request for one attempt. The user agent is re-drawn each time.
    pub fn request_for(&self, url: &str) -> PageRequest {
        PageRequest {
            url: url.to_string(),
            user_agent: self.pick_user_agent(),
            headers: self.headers.headers_for(url),
            timeout: self.timeout,
        }
    }

    /// Fetch a target page and extract its image reference.
    ///
    /// Throttling responses are retried up to the policy's bound, sleeping
    /// [`Throttle::backoff_for_retry`] in between. Anything else ends the
    /// target with `None`.
    pub async fn fetch(&self, target: &str) -> Option<Reference> {
        let mut attempt = 0;
        loop {
            let request = self.request_for(target);
            match self.transport.fetch(&request).await {
                Ok(body) => return self.extract(target, &body),
                Err(e) if self.retry.should_retry(&e, attempt) => {
                    let wait = self.throttle.backoff_for_retry(attempt);
                    tracing::warn!(
                        url = %target,
                        error = %e,
                        attempt = attempt + 1,
                        wait_secs = wait.as_secs(),
                        "Throttled, backing off"
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::debug!(url = %target, error = %e, attempt, "Fetch failed");
                    return None;
                }
            }
        }
    }

    fn extract(&self, target: &str, body: &[u8]) -> Option<Reference> {
        // Invalid byte sequences are dropped rather than replaced.
        let content = match String::from_utf8_lossy(body) {
            Cow::Borrowed(valid) => Cow::Borrowed(valid),
            Cow::Owned(lossy) => Cow::Owned(lossy.replace(char::REPLACEMENT_CHARACTER, "")),
        };
        match self.extractor.extract(&content) {
            Ok(found) => found,
            Err(e) => {
                tracing::debug!(url = %target, error = %e, "Extraction failed");
                None
            }
        }
    }

    /// Best-effort request to establish the transport session.
    pub async fn warm_up(&self, url: &str) -> Result<(), AppError> {
        let request = PageRequest {
            url: url.to_string(),
            user_agent: self.pick_user_agent(),
            headers: vec![("Accept".to_string(), "text/html".to_string())],
            timeout: WARMUP_TIMEOUT,
        };
        self.transport.establish_session(&request).await
    }
}
