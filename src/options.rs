use std::time::Duration;

use reqwest::header::HeaderMap;

use crate::{profile, Cookies};

/// Per-client defaults and retry behavior.
#[derive(Clone, Debug, PartialEq)]
pub struct ClientOptions {
    /// Per-attempt timeout used when a call does not override it.
    pub timeout: Duration,
    /// Headers used when a call does not supply its own.
    pub headers: HeaderMap,
    /// Cookies used when a call does not supply its own.
    pub cookies: Option<Cookies>,
    /// Total number of attempts, including the first one. Must be at least 1.
    pub tries: u32,
    /// Fixed pause between attempts.
    pub retry_delay: Duration,
    /// Optional bound on the whole retry sequence.
    pub deadline: Option<Duration>,
}

impl ClientOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_cookies<I, K, V>(mut self, cookies: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.cookies = Some(
            cookies
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        );
        self
    }

    pub fn with_tries(mut self, tries: u32) -> Self {
        self.tries = tries;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: profile::DEFAULT_TIMEOUT,
            headers: profile::default_headers(),
            cookies: None,
            tries: 3,
            retry_delay: Duration::from_secs(2),
            deadline: None,
        }
    }
}
