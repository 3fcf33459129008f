use std::{fmt, sync::Arc};

use futures_util::future::BoxFuture;
use reqwest::Method;
use tokio::time::{sleep, timeout};

use crate::{
    transport::Transport, ClientOptions, Request, RequestOptions, RequestsConfig, RequestsError,
    ReqwestTransport, Response, Result, ScopedWebSocket, TransportError,
};

/// Retrying request client over an injected [`Transport`].
///
/// Every call resolves its headers, cookies, timeout and proxy against the
/// client's [`ClientOptions`] and the proxy URL captured from
/// [`RequestsConfig`], then hands the finished [`Request`] to the transport.
/// Failed attempts are retried `tries - 1` times with a fixed delay.
pub struct RequestsClient<T: Transport = ReqwestTransport> {
    transport: Arc<T>,
    proxy_url: Option<String>,
    options: ClientOptions,
}

impl<T: Transport> Clone for RequestsClient<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            proxy_url: self.proxy_url.clone(),
            options: self.options.clone(),
        }
    }
}

impl<T: Transport> fmt::Debug for RequestsClient<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestsClient")
            .field("transport", &self.transport.name())
            .field("proxy_url", &self.proxy_url)
            .field("timeout", &self.options.timeout)
            .field(
                "headers",
                &self.options.headers.keys().map(|name| name.as_str()).collect::<Vec<_>>(),
            )
            .field(
                "cookies",
                &self.options.cookies.as_ref().map(|_| "<redacted>"),
            )
            .field("tries", &self.options.tries)
            .field("retry_delay", &self.options.retry_delay)
            .field("deadline", &self.options.deadline)
            .finish()
    }
}

impl RequestsClient<ReqwestTransport> {
    /// Creates a client backed by a fresh [`ReqwestTransport`].
    pub fn with_reqwest(config: &RequestsConfig) -> Result<Self> {
        Self::new(ReqwestTransport::new(), config)
    }
}

impl<T: Transport> RequestsClient<T> {
    /// Creates a client with default options.
    ///
    /// Fails with [`RequestsError::Construction`] if the transport cannot
    /// open outbound connections.
    pub fn new(transport: impl Into<Arc<T>>, config: &RequestsConfig) -> Result<Self> {
        let transport = transport.into();
        if !transport.supports_forward() {
            return Err(RequestsError::Construction {
                transport: transport.name().to_owned(),
            });
        }

        Ok(Self {
            transport,
            proxy_url: config.proxy_url().map(str::to_owned),
            options: ClientOptions::default(),
        })
    }

    /// Applies client options such as timeout, headers and retry behavior.
    pub fn with_options(mut self, options: ClientOptions) -> Result<Self> {
        if options.tries == 0 {
            return Err(RequestsError::Config(
                "tries must be at least 1".to_owned(),
            ));
        }
        self.options = options;
        Ok(self)
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Proxy URL applied to calls that keep `use_proxy` enabled.
    pub fn proxy_url(&self) -> Option<&str> {
        self.proxy_url.as_deref()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Sends a `GET` request with retries.
    pub async fn get(&self, url: &str, options: RequestOptions) -> Result<Response> {
        self.send(Method::GET, url, options).await
    }

    /// Sends a `POST` request with retries.
    pub async fn post(&self, url: &str, options: RequestOptions) -> Result<Response> {
        self.send(Method::POST, url, options).await
    }

    /// Sends a request with any method, with retries.
    pub async fn send(&self, method: Method, url: &str, options: RequestOptions) -> Result<Response> {
        let request = self.build_request(method, url, options)?;
        self.request(&request).await
    }

    /// Resolves per-call options against the client defaults.
    ///
    /// Explicit headers, cookies and timeout replace the client's values;
    /// they are never merged. The proxy is the configured one when
    /// `use_proxy` is set and none otherwise.
    pub fn build_request(
        &self,
        method: Method,
        url: &str,
        mut options: RequestOptions,
    ) -> Result<Request> {
        let body = options.take_body()?;

        Ok(Request {
            method,
            url: url.to_owned(),
            params: options.params,
            headers: options
                .headers
                .unwrap_or_else(|| self.options.headers.clone()),
            cookies: options
                .cookies
                .or_else(|| self.options.cookies.clone())
                .unwrap_or_default(),
            body,
            timeout: options.timeout.unwrap_or(self.options.timeout),
            proxy: if options.use_proxy {
                self.proxy_url.clone()
            } else {
                None
            },
        })
    }

    /// Sends a pre-built request, retrying transport failures.
    ///
    /// The error of the final attempt is returned unchanged; earlier ones
    /// are only logged.
    pub async fn request(&self, request: &Request) -> Result<Response> {
        match self.options.deadline {
            Some(deadline) => timeout(deadline, self.send_with_retry(request))
                .await
                .map_err(|_| RequestsError::DeadlineExceeded(deadline))?,
            None => self.send_with_retry(request).await,
        }
    }

    /// Opens a WebSocket connection without retries.
    ///
    /// The returned guard closes the connection when dropped; prefer
    /// [`ScopedWebSocket::close`] to observe close errors. Like HTTP calls,
    /// the connection goes through the configured proxy unless
    /// `use_proxy(false)` is set; [`ReqwestTransport`](crate::ReqwestTransport)
    /// tunnels it with HTTP `CONNECT`.
    pub async fn open_websocket(
        &self,
        method: Method,
        url: &str,
        options: RequestOptions,
    ) -> Result<ScopedWebSocket<T::WebSocket>> {
        let request = self.build_request(method, url, options)?;
        let connection = self.transport.websocket(&request).await?;
        Ok(ScopedWebSocket::new(connection))
    }

    /// Opens a WebSocket, runs `f` with it and closes it exactly once.
    ///
    /// The connection is closed whether `f` succeeds or fails. A close
    /// error is reported only when `f` itself succeeded.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use forward_requests::{
    ///     Method, RequestOptions, RequestsClient, RequestsConfig, RequestsError,
    ///     WebSocketConnection, WsMessage,
    /// };
    ///
    /// # async fn run() -> forward_requests::Result<()> {
    /// let client = RequestsClient::with_reqwest(&RequestsConfig::default())?;
    /// let reply = client
    ///     .websocket(Method::GET, "wss://echo.example/ws", RequestOptions::new(), |ws| {
    ///         Box::pin(async move {
    ///             ws.send(WsMessage::Text("ping".to_owned())).await?;
    ///             Ok::<_, RequestsError>(ws.receive().await?)
    ///         })
    ///     })
    ///     .await?;
    /// # let _ = reply;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn websocket<F, R>(
        &self,
        method: Method,
        url: &str,
        options: RequestOptions,
        f: F,
    ) -> Result<R>
    where
        F: for<'a> FnOnce(&'a mut T::WebSocket) -> BoxFuture<'a, Result<R>>,
    {
        let mut socket = self.open_websocket(method, url, options).await?;
        let outcome = f(&mut *socket).await;
        let closed = socket.close().await;

        match (outcome, closed) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(err)) => Err(err),
            (Err(err), closed) => {
                if let Err(close_err) = closed {
                    log_close_failure(&close_err);
                }
                Err(err)
            }
        }
    }

    async fn send_with_retry(&self, request: &Request) -> Result<Response> {
        let mut remaining = self.options.tries;
        loop {
            #[cfg(feature = "tracing")]
            tracing::debug!(request = %request, remaining, "sending request");

            match self.transport.request(request).await {
                Ok(response) => return Ok(response),
                Err(err) => {
                    remaining = remaining.saturating_sub(1);
                    if remaining == 0 {
                        return Err(RequestsError::Transport(err));
                    }
                    self.wait_before_retry(request, &err, remaining).await;
                }
            }
        }
    }

    /// Waits the fixed retry delay before the next attempt.
    async fn wait_before_retry(
        &self,
        request: &Request,
        err: &TransportError,
        remaining: u32,
    ) {
        let delay = self.options.retry_delay;

        #[cfg(feature = "tracing")]
        tracing::warn!(
            request = %request,
            error = %err,
            delay_ms = delay.as_millis() as u64,
            remaining,
            "request failed, retrying"
        );

        #[cfg(not(feature = "tracing"))]
        let _ = (request, err, remaining);

        sleep(delay).await;
    }
}

fn log_close_failure(err: &RequestsError) {
    #[cfg(feature = "tracing")]
    tracing::debug!(error = %err, "websocket close failed after an earlier error");
    #[cfg(not(feature = "tracing"))]
    let _ = err;
}
