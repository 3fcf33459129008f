use std::{fmt, time::Duration};

use reqwest::{header::HeaderMap, Method};
use serde::de::DeserializeOwned;

use crate::{decode, Result};

/// Cookie name/value pairs, sent in order.
pub type Cookies = Vec<(String, String)>;

/// One part of a multipart upload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileUpload {
    pub field: String,
    pub filename: Option<String>,
    pub content: Vec<u8>,
    pub content_type: Option<String>,
}

impl FileUpload {
    pub fn new(field: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            field: field.into(),
            filename: None,
            content: content.into(),
            content_type: None,
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// Request payload.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Body {
    #[default]
    Empty,
    /// Raw bytes sent as is.
    Raw(Vec<u8>),
    /// `application/x-www-form-urlencoded` fields.
    Form(Vec<(String, String)>),
    /// JSON document.
    Json(serde_json::Value),
    /// `multipart/form-data` text fields and files.
    Multipart {
        fields: Vec<(String, String)>,
        files: Vec<FileUpload>,
    },
}

impl Body {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

/// Fully resolved request descriptor handed to a transport.
///
/// Built by [`RequestsClient::build_request`](crate::RequestsClient::build_request);
/// headers, timeout and proxy never carry "use the default" placeholders.
#[derive(Clone, Debug, PartialEq)]
pub struct Request {
    pub(crate) method: Method,
    pub(crate) url: String,
    pub(crate) params: Vec<(String, String)>,
    pub(crate) headers: HeaderMap,
    pub(crate) cookies: Cookies,
    pub(crate) body: Body,
    pub(crate) timeout: Duration,
    pub(crate) proxy: Option<String>,
}

impl Request {
    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Query parameters appended to the URL.
    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn cookies(&self) -> &[(String, String)] {
        &self.cookies
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    /// Timeout for a single attempt.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn proxy(&self) -> Option<&str> {
        self.proxy.as_deref()
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)?;
        if let Some(proxy) = &self.proxy {
            write!(f, " via {proxy}")?;
        }
        Ok(())
    }
}

/// Response body as produced by the transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Content {
    Bytes(Vec<u8>),
    Text(String),
}

impl From<Vec<u8>> for Content {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl From<String> for Content {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for Content {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Response {
    pub status: u16,
    pub headers: HeaderMap,
    pub url: String,
    pub content: Option<Content>,
}

impl Response {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            url: String::new(),
            content: None,
        }
    }

    pub fn with_content(mut self, content: impl Into<Content>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parses the content as JSON. See [`decode::parse_content_json`].
    pub fn json<D: DeserializeOwned>(&self) -> Result<D> {
        decode::parse_content_json(self)
    }

    /// Decodes the content as text. See [`decode::parse_content_text`].
    pub fn text(&self, encoding: &str) -> Result<Option<String>> {
        decode::parse_content_text(self, encoding)
    }
}

/// WebSocket data frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WsMessage {
    Text(String),
    Binary(Vec<u8>),
}
