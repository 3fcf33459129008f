//! Seams to the component that performs the actual network I/O.

use std::future::Future;

use crate::{Request, Response, TransportError, WsMessage};

/// Executes fully resolved requests.
///
/// The client never inspects connections, pools or TLS; all of that lives
/// behind this trait. Implementations must be shareable across tasks.
///
/// # Implementations
///
/// - [`ReqwestTransport`](crate::ReqwestTransport): `reqwest` + `tokio-tungstenite`
/// - test doubles
pub trait Transport: Send + Sync + 'static {
    /// Connection type returned by [`Transport::websocket`].
    type WebSocket: WebSocketConnection + 'static;

    /// Short name used in diagnostics.
    fn name(&self) -> &str;

    /// Whether this transport can initiate outbound connections.
    fn supports_forward(&self) -> bool;

    /// Performs one HTTP request attempt.
    fn request(
        &self,
        request: &Request,
    ) -> impl Future<Output = Result<Response, TransportError>> + Send;

    /// Opens a WebSocket connection described by `request`.
    fn websocket(
        &self,
        request: &Request,
    ) -> impl Future<Output = Result<Self::WebSocket, TransportError>> + Send;
}

/// An open WebSocket connection.
pub trait WebSocketConnection: Send {
    fn send(&mut self, message: WsMessage)
        -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Returns the next data frame, or `None` once the peer has closed.
    fn receive(&mut self) -> impl Future<Output = Result<Option<WsMessage>, TransportError>> + Send;

    /// Closes the connection. Closing twice must be harmless.
    fn close(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;
}
