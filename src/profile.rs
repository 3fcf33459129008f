//! Baseline headers and timeout shared by every client.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

/// Timeout applied when neither the client nor the call overrides it.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const DEFAULT_HEADERS: [(&str, &str); 10] = [
    ("accept", "*/*"),
    ("accept-encoding", "gzip, deflate, br"),
    ("accept-language", "zh-CN,zh;q=0.9"),
    ("dnt", "1"),
    (
        "sec-ch-ua",
        "\"Not?A_Brand\";v=\"8\", \"Chromium\";v=\"108\", \"Google Chrome\";v=\"108\"",
    ),
    ("sec-ch-ua-mobile", "?0"),
    ("sec-ch-ua-platform", "\"Windows\""),
    ("sec-gpc", "1"),
    ("upgrade-insecure-requests", "1"),
    (
        "user-agent",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
         (KHTML, like Gecko) Chrome/114.0.0.0 Safari/537.36",
    ),
];

/// Returns a fresh copy of the browser-like baseline headers.
///
/// Every call builds a new map, so mutating the result never leaks into
/// other clients or later calls.
pub fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(DEFAULT_HEADERS.len());
    for (name, value) in DEFAULT_HEADERS {
        headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }
    headers
}

/// Returns [`DEFAULT_TIMEOUT`].
pub fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}
