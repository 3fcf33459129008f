//! Scoped WebSocket handle.

use std::ops::{Deref, DerefMut};

use crate::{Result, WebSocketConnection};

/// WebSocket connection that is closed on every exit path.
///
/// Call [`ScopedWebSocket::close`] to close explicitly and observe the
/// result. A guard dropped while still open (early return, panic, or task
/// cancellation) schedules the close on the current tokio runtime.
#[derive(Debug)]
pub struct ScopedWebSocket<C: WebSocketConnection + 'static> {
    connection: Option<C>,
}

impl<C: WebSocketConnection + 'static> ScopedWebSocket<C> {
    pub(crate) fn new(connection: C) -> Self {
        Self {
            connection: Some(connection),
        }
    }

    /// Closes the connection. Later drops do nothing.
    pub async fn close(mut self) -> Result<()> {
        match self.connection.take() {
            Some(mut connection) => Ok(connection.close().await?),
            None => Ok(()),
        }
    }
}

impl<C: WebSocketConnection + 'static> Deref for ScopedWebSocket<C> {
    type Target = C;

    fn deref(&self) -> &C {
        // Emptied only by `close` and `drop`, which both consume the guard.
        self.connection
            .as_ref()
            .unwrap_or_else(|| unreachable!("websocket used after close"))
    }
}

impl<C: WebSocketConnection + 'static> DerefMut for ScopedWebSocket<C> {
    fn deref_mut(&mut self) -> &mut C {
        self.connection
            .as_mut()
            .unwrap_or_else(|| unreachable!("websocket used after close"))
    }
}

impl<C: WebSocketConnection + 'static> Drop for ScopedWebSocket<C> {
    fn drop(&mut self) {
        let Some(mut connection) = self.connection.take() else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(err) = connection.close().await {
                        #[cfg(feature = "tracing")]
                        tracing::debug!(error = %err, "closing dropped websocket failed");
                        #[cfg(not(feature = "tracing"))]
                        let _ = err;
                    }
                });
            }
            Err(_) => {
                #[cfg(feature = "tracing")]
                tracing::warn!("websocket dropped outside a tokio runtime; close skipped");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use super::ScopedWebSocket;
    use crate::{TransportError, WebSocketConnection, WsMessage};

    struct CountingSocket {
        closes: Arc<AtomicUsize>,
    }

    impl WebSocketConnection for CountingSocket {
        async fn send(&mut self, _message: WsMessage) -> Result<(), TransportError> {
            Ok(())
        }

        async fn receive(&mut self) -> Result<Option<WsMessage>, TransportError> {
            Ok(None)
        }

        async fn close(&mut self) -> Result<(), TransportError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn explicit_close_happens_once() {
        let closes = Arc::new(AtomicUsize::new(0));
        let guard = ScopedWebSocket::new(CountingSocket {
            closes: closes.clone(),
        });

        guard.close().await.expect("close must succeed");
        tokio::task::yield_now().await;
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn drop_schedules_close() {
        let closes = Arc::new(AtomicUsize::new(0));
        drop(ScopedWebSocket::new(CountingSocket {
            closes: closes.clone(),
        }));

        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }
}
