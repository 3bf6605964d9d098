//! Transports carrying envelopes to a resolver.

use crate::{SessionError, SessionResult};
use async_trait::async_trait;
use futures_util::future::BoxFuture;
use futures_util::{SinkExt, StreamExt};
use std::future::Future;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

/// One request/response exchange with a resolver.
///
/// Implementations serialize exchanges: a second call waits until the first
/// one has its answer.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one message and wait for the next message from the resolver.
    async fn round_trip(&self, message: String) -> SessionResult<String>;

    /// Wait for the next message without sending anything.
    ///
    /// Used to skip replies to requests that were abandoned after a timeout.
    /// Transports that never leave replies behind have nothing to read.
    async fn receive(&self) -> SessionResult<String> {
        Err(SessionError::ConnectionClosed)
    }

    /// Shut the transport down.
    async fn close(&self) -> SessionResult<()> {
        Ok(())
    }
}

/// How hard to try reaching a resolver that is not accepting connections yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectPolicy {
    /// Total attempts, including the first.
    pub attempts: u32,
    /// Delay after the first failed attempt.
    pub retry_delay: Duration,
    /// Upper bound for the doubling delay.
    pub max_delay: Duration,
}

impl Default for ConnectPolicy {
    fn default() -> Self {
        Self {
            attempts: 100,
            retry_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(1000),
        }
    }
}

impl ConnectPolicy {
    /// Delay before the attempt following failed attempt number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        std::cmp::min(self.retry_delay.saturating_mul(factor), self.max_delay)
    }
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket connection to a resolver.
pub struct WebSocketTransport {
    url: String,
    stream: Mutex<WsStream>,
}

impl WebSocketTransport {
    /// Connect to `url`, retrying refused or dropped connections per `policy`.
    pub async fn connect(url: &str, policy: &ConnectPolicy) -> SessionResult<Self> {
        let attempts = policy.attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match connect_async(url).await {
                Ok((stream, _)) => {
                    info!(url = %url, attempt, "Connected to resolver");
                    return Ok(Self {
                        url: url.to_string(),
                        stream: Mutex::new(stream),
                    });
                }
                Err(e) if attempt < attempts && is_retryable(&e) => {
                    let delay = policy.delay(attempt);
                    debug!(url = %url, attempt, delay_ms = delay.as_millis() as u64, error = %e, "Resolver not reachable yet");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    warn!(url = %url, attempt, error = %e, "Giving up connecting to resolver");
                    return Err(SessionError::Connection(format!(
                        "{url}: {e} (after {attempt} attempts)"
                    )));
                }
            }
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

fn is_retryable(err: &tungstenite::Error) -> bool {
    matches!(
        err,
        tungstenite::Error::Io(_)
            | tungstenite::Error::ConnectionClosed
            | tungstenite::Error::AlreadyClosed
    )
}

fn closed_or(err: tungstenite::Error) -> SessionError {
    match err {
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
            SessionError::ConnectionClosed
        }
        other => SessionError::WebSocket(other),
    }
}

impl WebSocketTransport {
    async fn next_text(&self, stream: &mut WsStream) -> SessionResult<String> {
        while let Some(frame) = stream.next().await {
            match frame.map_err(closed_or)? {
                Message::Text(text) => return Ok(text.as_str().to_owned()),
                Message::Ping(payload) => {
                    stream.send(Message::Pong(payload)).await.map_err(closed_or)?;
                }
                Message::Close(frame) => {
                    debug!(url = %self.url, ?frame, "Resolver closed the connection");
                    return Err(SessionError::ConnectionClosed);
                }
                _ => {}
            }
        }
        Err(SessionError::ConnectionClosed)
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn round_trip(&self, message: String) -> SessionResult<String> {
        let mut stream = self.stream.lock().await;
        stream
            .send(Message::Text(message.into()))
            .await
            .map_err(closed_or)?;
        self.next_text(&mut stream).await
    }

    async fn receive(&self) -> SessionResult<String> {
        let mut stream = self.stream.lock().await;
        self.next_text(&mut stream).await
    }

    async fn close(&self) -> SessionResult<()> {
        let mut stream = self.stream.lock().await;
        match stream.close(None).await {
            Ok(()) => Ok(()),
            Err(e) => match closed_or(e) {
                SessionError::ConnectionClosed => Ok(()),
                other => Err(other),
            },
        }
    }
}

type Handler = Box<dyn Fn(String) -> BoxFuture<'static, SessionResult<String>> + Send + Sync>;

/// Hands every message to an in-process handler.
pub struct LoopbackTransport {
    handler: Handler,
}

impl LoopbackTransport {
    /// Wrap an async handler.
    pub fn new<F, Fut>(handler: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = SessionResult<String>> + Send + 'static,
    {
        Self {
            handler: Box::new(move |message| Box::pin(handler(message))),
        }
    }

    /// Wrap a handler that answers immediately.
    pub fn from_fn<F>(handler: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        Self::new(move |message: String| std::future::ready(Ok(handler(&message))))
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn round_trip(&self, message: String) -> SessionResult<String> {
        (self.handler)(message).await
    }
}
