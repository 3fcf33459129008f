//! Proxy configuration and the derived proxy URL.

use std::{
    fmt,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    str::FromStr,
};

use serde::Deserialize;

use crate::{RequestsError, Result};

const ENV_ENABLE_PROXY: &str = "REQUESTS_ENABLE_PROXY";
const ENV_PROXY_TYPE: &str = "REQUESTS_PROXY_TYPE";
const ENV_PROXY_ADDRESS: &str = "REQUESTS_PROXY_ADDRESS";
const ENV_PROXY_PORT: &str = "REQUESTS_PROXY_PORT";

/// Proxy schemes accepted in configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyScheme {
    #[default]
    Http,
}

impl ProxyScheme {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
        }
    }
}

impl fmt::Display for ProxyScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProxyScheme {
    type Err = RequestsError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim() {
            "http" => Ok(Self::Http),
            other => Err(RequestsError::Config(format!(
                "unsupported proxy type '{other}', expected 'http'"
            ))),
        }
    }
}

/// Raw proxy settings as found in the host configuration.
///
/// Unknown keys are ignored and missing keys fall back to their defaults.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProxySettings {
    pub enable_proxy: bool,
    pub proxy_type: ProxyScheme,
    pub proxy_address: IpAddr,
    pub proxy_port: u16,
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            enable_proxy: false,
            proxy_type: ProxyScheme::Http,
            proxy_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            proxy_port: 1081,
        }
    }
}

/// Derives the proxy URL from settings, or `None` when proxying is disabled.
///
/// Example: `http://203.0.113.5:8080`. IPv6 addresses are bracketed.
pub fn resolve_proxy_url(settings: &ProxySettings) -> Option<String> {
    settings.enable_proxy.then(|| {
        let socket = SocketAddr::new(settings.proxy_address, settings.proxy_port);
        format!("{}://{socket}", settings.proxy_type)
    })
}

/// Validated configuration handed to clients at startup.
///
/// The proxy URL is derived once here and reused by every request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestsConfig {
    settings: ProxySettings,
    proxy_url: Option<String>,
}

impl RequestsConfig {
    pub fn new(settings: ProxySettings) -> Self {
        let proxy_url = resolve_proxy_url(&settings);
        Self {
            settings,
            proxy_url,
        }
    }

    /// Parses settings from a JSON document with camelCase keys.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let settings = serde_json::from_str::<ProxySettings>(json)
            .map_err(|err| RequestsError::Config(format!("invalid proxy settings: {err}")))?;
        Ok(Self::new(settings))
    }

    /// Parses settings from an already decoded JSON value.
    pub fn from_json_value(value: serde_json::Value) -> Result<Self> {
        let settings = serde_json::from_value::<ProxySettings>(value)
            .map_err(|err| RequestsError::Config(format!("invalid proxy settings: {err}")))?;
        Ok(Self::new(settings))
    }

    /// Creates configuration from environment variables.
    ///
    /// Reads:
    /// - `REQUESTS_ENABLE_PROXY` — `true`/`false` (also `1`/`0`, `yes`/`no`, `on`/`off`)
    /// - `REQUESTS_PROXY_TYPE` — only `http`
    /// - `REQUESTS_PROXY_ADDRESS` — IPv4 or IPv6 address
    /// - `REQUESTS_PROXY_PORT` — port number
    ///
    /// Unset variables keep their defaults; set but malformed ones, empty
    /// values included, are errors.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = ProxySettings::default();

        if let Some(value) = lookup(ENV_ENABLE_PROXY) {
            settings.enable_proxy = parse_bool(ENV_ENABLE_PROXY, &value)?;
        }
        if let Some(value) = lookup(ENV_PROXY_TYPE) {
            settings.proxy_type = value.parse()?;
        }
        if let Some(value) = lookup(ENV_PROXY_ADDRESS) {
            settings.proxy_address = value.trim().parse().map_err(|err| {
                RequestsError::Config(format!("{ENV_PROXY_ADDRESS} '{value}' is invalid: {err}"))
            })?;
        }
        if let Some(value) = lookup(ENV_PROXY_PORT) {
            settings.proxy_port = value.trim().parse().map_err(|err| {
                RequestsError::Config(format!("{ENV_PROXY_PORT} '{value}' is invalid: {err}"))
            })?;
        }

        Ok(Self::new(settings))
    }

    pub fn settings(&self) -> &ProxySettings {
        &self.settings
    }

    /// Proxy URL used by calls that opt into proxying.
    pub fn proxy_url(&self) -> Option<&str> {
        self.proxy_url.as_deref()
    }
}

impl Default for RequestsConfig {
    fn default() -> Self {
        Self::new(ProxySettings::default())
    }
}

impl From<ProxySettings> for RequestsConfig {
    fn from(settings: ProxySettings) -> Self {
        Self::new(settings)
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(RequestsError::Config(format!(
            "{key} '{value}' is not a boolean"
        ))),
    }
}
