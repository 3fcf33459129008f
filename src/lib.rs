//! `forward-requests` is a retrying HTTP/WebSocket client façade over a
//! pluggable forward transport.
//!
//! A [`RequestsClient`] merges per-call [`RequestOptions`] with its
//! [`ClientOptions`] (browser-like default headers, timeout, cookies) and the
//! proxy derived from [`RequestsConfig`], then hands the resolved [`Request`]
//! to a [`Transport`]:
//! - [`RequestsClient::get`]
//! - [`RequestsClient::post`]
//! - [`RequestsClient::request`]
//! - [`RequestsClient::websocket`]
//!
//! Failed attempts are retried a fixed number of times with a fixed delay.

mod client;
mod config;
mod decode;
mod error;
mod options;
mod params;
mod profile;
mod reqwest_transport;
mod transport;
mod types;
mod websocket;

pub use client::RequestsClient;
pub use config::{resolve_proxy_url, ProxyScheme, ProxySettings, RequestsConfig};
pub use decode::{filename_from_url, parse_content_json, parse_content_text};
pub use error::{RequestsError, TransportError};
pub use options::ClientOptions;
pub use params::RequestOptions;
pub use profile::{default_headers, default_timeout, DEFAULT_TIMEOUT};
pub use reqwest::{header::HeaderMap, Method};
pub use reqwest_transport::{ReqwestTransport, ReqwestWebSocket};
pub use transport::{Transport, WebSocketConnection};
pub use types::{Body, Content, Cookies, FileUpload, Request, Response, WsMessage};
pub use websocket::ScopedWebSocket;

pub type Result<T> = std::result::Result<T, RequestsError>;
