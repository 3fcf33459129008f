use std::time::Duration;

/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum RequestsError {
    /// The injected transport cannot initiate outbound connections.
    #[error("transport '{transport}' doesn't support forward connections")]
    Construction {
        /// Name reported by the rejected transport.
        transport: String,
    },
    /// Invalid configuration or client options.
    #[error("configuration error: {0}")]
    Config(String),
    /// The request could not be assembled (for example conflicting bodies).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// Failure reported by the transport on the final attempt.
    #[error(transparent)]
    Transport(TransportError),
    /// The optional overall deadline elapsed before a response arrived.
    #[error("request deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),
    /// Response content is not valid JSON.
    #[error("invalid JSON content: {0}")]
    Json(#[source] serde_json::Error),
    /// Response content could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<TransportError> for RequestsError {
    fn from(err: TransportError) -> Self {
        Self::Transport(err)
    }
}

/// Failure raised by a [`Transport`](crate::Transport) implementation.
///
/// The retry loop treats every variant the same way.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Connection could not be established.
    #[error("connection failed: {0}")]
    Connect(String),
    /// Request did not finish within its timeout.
    #[error("request timed out: {0}")]
    Timeout(String),
    /// Any other request execution failure.
    #[error("request failed: {0}")]
    Request(String),
    /// WebSocket handshake or frame error.
    #[error("websocket error: {0}")]
    WebSocket(String),
    /// The transport cannot honour part of the request.
    #[error("unsupported by transport: {0}")]
    Unsupported(String),
}

#[cfg(test)]
mod tests {
    use super::{RequestsError, TransportError};

    #[test]
    fn transport_error_message_is_preserved() {
        let err = RequestsError::from(TransportError::Connect("refused".to_owned()));
        assert_eq!(err.to_string(), "connection failed: refused");
    }

    #[test]
    fn construction_error_names_transport() {
        let err = RequestsError::Construction {
            transport: "webhook".to_owned(),
        };
        assert!(err.to_string().contains("'webhook'"));
    }
}
