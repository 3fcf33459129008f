//! Default [`Transport`] built on `reqwest` and `tokio-tungstenite`.

use std::{
    collections::HashMap,
    error::Error as StdError,
    fmt,
    sync::{Mutex, PoisonError},
};

use futures_util::{SinkExt, StreamExt};
use reqwest::{
    header::{HeaderMap, HeaderValue, COOKIE},
    multipart, Method,
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
};
use tokio_tungstenite::{
    client_async_tls, connect_async,
    tungstenite::{
        client::IntoClientRequest, handshake::client::Request as Handshake, Error as WsError,
        Message,
    },
    MaybeTlsStream, WebSocketStream,
};
use url::Url;

use crate::{
    Body, Content, FileUpload, Request, Response, Transport, TransportError, WebSocketConnection,
    WsMessage,
};

/// Forward transport backed by `reqwest` for HTTP and `tokio-tungstenite`
/// for WebSockets.
///
/// One `reqwest::Client` is built lazily per distinct proxy and reused, so
/// connections are pooled per route. Requests without a proxy ignore the
/// proxy environment variables.
///
/// WebSockets reach a proxy through an HTTP `CONNECT` tunnel; TLS for `wss`
/// URLs is negotiated end to end inside the tunnel.
#[derive(Default)]
pub struct ReqwestTransport {
    clients: Mutex<HashMap<Option<String>, reqwest::Client>>,
}

impl fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let routes = self
            .clients
            .lock()
            .map(|clients| clients.len())
            .unwrap_or_default();
        f.debug_struct("ReqwestTransport")
            .field("routes", &routes)
            .finish()
    }
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn client_for(&self, proxy: Option<&str>) -> Result<reqwest::Client, TransportError> {
        let key = proxy.map(str::to_owned);
        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(client) = clients.get(&key) {
            return Ok(client.clone());
        }

        let builder = match proxy {
            Some(url) => reqwest::Client::builder().proxy(reqwest::Proxy::all(url).map_err(
                |err| TransportError::Request(format!("invalid proxy '{url}': {err}")),
            )?),
            None => reqwest::Client::builder().no_proxy(),
        };
        let client = builder
            .build()
            .map_err(|err| TransportError::Request(error_chain(&err)))?;

        clients.insert(key, client.clone());
        Ok(client)
    }
}

impl Transport for ReqwestTransport {
    type WebSocket = ReqwestWebSocket;

    fn name(&self) -> &str {
        "reqwest"
    }

    fn supports_forward(&self) -> bool {
        true
    }

    async fn request(&self, request: &Request) -> Result<Response, TransportError> {
        let client = self.client_for(request.proxy())?;

        let mut builder = client
            .request(request.method().clone(), request.url())
            .headers(request_headers(request)?)
            .timeout(request.timeout());
        if !request.params().is_empty() {
            builder = builder.query(request.params());
        }
        builder = match request.body() {
            Body::Empty => builder,
            Body::Raw(bytes) => builder.body(bytes.clone()),
            Body::Form(fields) => builder.form(fields),
            Body::Json(value) => builder.json(value),
            Body::Multipart { fields, files } => builder.multipart(multipart_form(fields, files)?),
        };

        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let url = response.url().to_string();
        let bytes = response.bytes().await.map_err(map_reqwest_error)?;

        Ok(Response {
            status,
            headers,
            url,
            content: Some(Content::Bytes(bytes.to_vec())),
        })
    }

    async fn websocket(&self, request: &Request) -> Result<ReqwestWebSocket, TransportError> {
        if request.method() != Method::GET {
            return Err(TransportError::Unsupported(format!(
                "websocket handshake requires GET, got {}",
                request.method()
            )));
        }
        if !request.body().is_empty() {
            return Err(TransportError::Unsupported(
                "websocket handshake with a request body".to_owned(),
            ));
        }

        let mut url = Url::parse(request.url()).map_err(|err| {
            TransportError::Request(format!("invalid websocket url '{}': {err}", request.url()))
        })?;
        if !request.params().is_empty() {
            url.query_pairs_mut().extend_pairs(request.params());
        }

        let mut handshake = url.as_str().into_client_request().map_err(map_ws_error)?;
        handshake.headers_mut().extend(request_headers(request)?);

        let connect = connect_websocket(handshake, &url, request.proxy());
        let stream = tokio::time::timeout(request.timeout(), connect)
            .await
            .map_err(|_| {
                TransportError::Timeout(format!(
                    "websocket handshake with {} exceeded {:?}",
                    request.url(),
                    request.timeout()
                ))
            })??;

        #[cfg(feature = "tracing")]
        tracing::debug!(url = %request.url(), proxy = ?request.proxy(), "websocket connected");

        Ok(ReqwestWebSocket {
            stream,
            closed: false,
        })
    }
}

/// WebSocket connection opened by [`ReqwestTransport`].
pub struct ReqwestWebSocket {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    closed: bool,
}

impl fmt::Debug for ReqwestWebSocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReqwestWebSocket")
            .field("closed", &self.closed)
            .finish()
    }
}

impl WebSocketConnection for ReqwestWebSocket {
    async fn send(&mut self, message: WsMessage) -> Result<(), TransportError> {
        let frame = match message {
            WsMessage::Text(text) => Message::Text(text.into()),
            WsMessage::Binary(data) => Message::Binary(data.into()),
        };
        self.stream.send(frame).await.map_err(map_ws_error)
    }

    async fn receive(&mut self) -> Result<Option<WsMessage>, TransportError> {
        loop {
            let frame = match self.stream.next().await {
                None => return Ok(None),
                Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) => return Ok(None),
                Some(Err(err)) => return Err(map_ws_error(err)),
                Some(Ok(frame)) => frame,
            };

            match frame {
                Message::Text(text) => return Ok(Some(WsMessage::Text(text.as_str().to_owned()))),
                Message::Binary(data) => return Ok(Some(WsMessage::Binary(data.to_vec()))),
                Message::Close(_) => return Ok(None),
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            }
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        match self.stream.close(None).await {
            Ok(()) | Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => Ok(()),
            Err(err) => Err(map_ws_error(err)),
        }
    }
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn connect_websocket(
    handshake: Handshake,
    url: &Url,
    proxy: Option<&str>,
) -> Result<WsStream, TransportError> {
    let (stream, _) = match proxy {
        None => connect_async(handshake).await,
        Some(proxy) => client_async_tls(handshake, open_tunnel(proxy, url).await?).await,
    }
    .map_err(map_ws_error)?;
    Ok(stream)
}

/// Opens an HTTP `CONNECT` tunnel through `proxy` to the host of `target`.
async fn open_tunnel(proxy: &str, target: &Url) -> Result<TcpStream, TransportError> {
    let proxy_url = Url::parse(proxy)
        .map_err(|err| TransportError::Request(format!("invalid proxy '{proxy}': {err}")))?;
    let proxy_host = proxy_url
        .host_str()
        .ok_or_else(|| TransportError::Request(format!("proxy '{proxy}' has no host")))?;
    let proxy_port = proxy_url.port_or_known_default().unwrap_or(80);
    let host = target
        .host_str()
        .ok_or_else(|| TransportError::Request(format!("websocket url '{target}' has no host")))?;
    let port = target
        .port_or_known_default()
        .ok_or_else(|| TransportError::Request(format!("websocket url '{target}' has no port")))?;
    let authority = format!("{host}:{port}");

    let mut stream = TcpStream::connect(format!("{proxy_host}:{proxy_port}"))
        .await
        .map_err(|err| TransportError::Connect(format!("proxy {proxy}: {err}")))?;
    let connect = format!("CONNECT {authority} HTTP/1.1\r\nHost: {authority}\r\n\r\n");
    stream
        .write_all(connect.as_bytes())
        .await
        .map_err(|err| TransportError::Connect(format!("proxy {proxy}: {err}")))?;

    // Byte at a time so nothing past the proxy reply is consumed.
    let mut reply = Vec::with_capacity(128);
    let mut byte = [0u8; 1];
    while !reply.ends_with(b"\r\n\r\n") {
        if reply.len() >= MAX_CONNECT_REPLY {
            return Err(TransportError::Connect(format!(
                "proxy {proxy} sent an oversized CONNECT reply"
            )));
        }
        let read = stream
            .read(&mut byte)
            .await
            .map_err(|err| TransportError::Connect(format!("proxy {proxy}: {err}")))?;
        if read == 0 {
            return Err(TransportError::Connect(format!(
                "proxy {proxy} closed the connection during CONNECT"
            )));
        }
        reply.push(byte[0]);
    }

    let reply = String::from_utf8_lossy(&reply);
    let status_line = reply.lines().next().unwrap_or_default();
    let status = status_line
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse::<u16>().ok());
    match status {
        Some(200..=299) => Ok(stream),
        _ => Err(TransportError::Connect(format!(
            "proxy {proxy} refused tunnel to {authority}: {status_line}"
        ))),
    }
}

const MAX_CONNECT_REPLY: usize = 8 * 1024;

/// Request headers with the cookie jar folded into a single `Cookie` header.
fn request_headers(request: &Request) -> Result<HeaderMap, TransportError> {
    let mut headers = request.headers().clone();
    if let Some(cookie) = merged_cookie(&headers, request.cookies())? {
        headers.insert(COOKIE, cookie);
    }
    Ok(headers)
}

fn merged_cookie(
    headers: &HeaderMap,
    cookies: &[(String, String)],
) -> Result<Option<HeaderValue>, TransportError> {
    if cookies.is_empty() {
        return Ok(None);
    }
    let mut parts = Vec::new();
    for existing in headers.get_all(COOKIE) {
        let existing = existing
            .to_str()
            .map_err(|err| TransportError::Request(format!("invalid cookie header: {err}")))?;
        parts.push(existing.trim_end_matches([';', ' ']).to_owned());
    }
    parts.extend(cookies.iter().map(|(name, value)| format!("{name}={value}")));

    HeaderValue::from_str(&parts.join("; "))
        .map(Some)
        .map_err(|err| TransportError::Request(format!("invalid cookie value: {err}")))
}

fn multipart_form(
    fields: &[(String, String)],
    files: &[FileUpload],
) -> Result<multipart::Form, TransportError> {
    let mut form = multipart::Form::new();
    for (name, value) in fields {
        form = form.text(name.clone(), value.clone());
    }
    for file in files {
        let mut part = multipart::Part::bytes(file.content.clone());
        if let Some(filename) = &file.filename {
            part = part.file_name(filename.clone());
        }
        if let Some(content_type) = &file.content_type {
            part = part.mime_str(content_type).map_err(|err| {
                TransportError::Request(format!("invalid content type '{content_type}': {err}"))
            })?;
        }
        form = form.part(file.field.clone(), part);
    }
    Ok(form)
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    let message = error_chain(&err);
    if err.is_timeout() {
        TransportError::Timeout(message)
    } else if err.is_connect() {
        TransportError::Connect(message)
    } else {
        TransportError::Request(message)
    }
}

fn map_ws_error(err: WsError) -> TransportError {
    match err {
        WsError::Io(io) => TransportError::Connect(io.to_string()),
        other => TransportError::WebSocket(other.to_string()),
    }
}

/// Joins an error with its sources, `reqwest` keeps the useful part there.
fn error_chain(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use reqwest::header::{HeaderMap, HeaderValue, COOKIE};

    use super::{error_chain, merged_cookie, ReqwestTransport};
    use crate::{Transport, TransportError};

    fn pairs(cookies: &[(&str, &str)]) -> Vec<(String, String)> {
        cookies
            .iter()
            .map(|(name, value)| ((*name).to_owned(), (*value).to_owned()))
            .collect()
    }

    #[test]
    fn cookie_header_joins_pairs() {
        let header = merged_cookie(&HeaderMap::new(), &pairs(&[("a", "1"), ("b", "2")]))
            .expect("valid cookies")
            .expect("header present");
        assert_eq!(header.to_str().expect("ascii"), "a=1; b=2");

        assert!(merged_cookie(&HeaderMap::new(), &[]).expect("no cookies").is_none());
    }

    #[test]
    fn cookie_header_merges_explicit_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("token=xyz;"));
        headers.append(COOKIE, HeaderValue::from_static("theme=dark"));

        let header = merged_cookie(&headers, &pairs(&[("sid", "abc")]))
            .expect("valid cookies")
            .expect("header present");
        assert_eq!(header.to_str().expect("ascii"), "token=xyz; theme=dark; sid=abc");
    }

    #[test]
    fn cookie_header_rejects_control_characters() {
        let err = merged_cookie(&HeaderMap::new(), &pairs(&[("a", "bad\nvalue")]))
            .expect_err("must reject");
        assert!(matches!(err, TransportError::Request(_)));
    }

    #[test]
    fn clients_are_cached_per_proxy() {
        let transport = ReqwestTransport::new();
        transport.client_for(None).expect("direct client");
        transport.client_for(None).expect("direct client again");
        transport
            .client_for(Some("http://127.0.0.1:1081"))
            .expect("proxied client");

        let clients = transport.clients.lock().expect("lock");
        assert_eq!(clients.len(), 2);
    }

    #[test]
    fn reports_forward_support() {
        let transport = ReqwestTransport::new();
        assert!(transport.supports_forward());
        assert_eq!(transport.name(), "reqwest");
    }

    #[test]
    fn error_chain_includes_sources() {
        let inner = std::io::Error::new(std::io::ErrorKind::Other, "refused");
        let outer = std::io::Error::new(std::io::ErrorKind::Other, inner);
        assert!(error_chain(&outer).contains("refused"));
    }
}
