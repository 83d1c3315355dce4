//! Duplex transport seam.
//!
//! The session only needs four capabilities from its transport: send a text
//! frame, send a binary frame, receive the next frame, and close. The
//! production implementation wraps a WebSocket; tests drive sessions through
//! in-memory implementations of the same trait.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::error::{SessionError, SessionResult};

/// A single frame received from or sent over the transport.
#[derive(Debug, Clone)]
pub enum Frame {
    /// Text frame carrying a JSON event
    Text(String),
    /// Binary frame carrying raw audio
    Binary(Bytes),
}

/// Persistent duplex connection to a realtime endpoint.
///
/// Sub-protocol negotiation is the implementation's concern; the session
/// treats the transport as an authenticated frame pipe.
#[async_trait]
pub trait Transport: Send {
    /// Send a text frame.
    async fn send_text(&mut self, text: &str) -> SessionResult<()>;

    /// Send a binary frame.
    async fn send_binary(&mut self, data: Bytes) -> SessionResult<()>;

    /// Receive the next frame. Returns `None` once the transport has closed.
    async fn recv(&mut self) -> Option<SessionResult<Frame>>;

    /// Close the transport.
    async fn close(&mut self) -> SessionResult<()>;
}

/// WebSocket transport over TLS.
pub struct WsTransport {
    inner: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsTransport {
    /// Open a WebSocket connection with bearer authentication.
    pub async fn connect(url: &str, api_key: &str) -> SessionResult<Self> {
        let parsed = url::Url::parse(url)
            .map_err(|e| SessionError::ConnectionFailed(format!("invalid endpoint: {e}")))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| SessionError::ConnectionFailed("endpoint has no host".to_string()))?
            .to_string();

        let request = http::Request::builder()
            .uri(url)
            .header("Authorization", format!("Bearer {api_key}"))
            .header(
                "Sec-WebSocket-Key",
                tungstenite::handshake::client::generate_key(),
            )
            .header("Sec-WebSocket-Version", "13")
            .header("Connection", "Upgrade")
            .header("Upgrade", "websocket")
            .header("Host", host)
            .body(())
            .map_err(|e| SessionError::ConnectionFailed(e.to_string()))?;

        let (stream, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| SessionError::ConnectionFailed(e.to_string()))?;

        tracing::info!(%url, "websocket transport connected");
        Ok(Self { inner: stream })
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn send_text(&mut self, text: &str) -> SessionResult<()> {
        self.inner
            .send(Message::Text(text.to_string().into()))
            .await
            .map_err(|e| SessionError::Transport(e.to_string()))
    }

    async fn send_binary(&mut self, data: Bytes) -> SessionResult<()> {
        self.inner
            .send(Message::Binary(data))
            .await
            .map_err(|e| SessionError::Transport(e.to_string()))
    }

    async fn recv(&mut self) -> Option<SessionResult<Frame>> {
        loop {
            match self.inner.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(Frame::Text(text.to_string()))),
                Ok(Message::Binary(data)) => return Some(Ok(Frame::Binary(data))),
                Ok(Message::Ping(payload)) => {
                    if let Err(e) = self.inner.send(Message::Pong(payload)).await {
                        return Some(Err(SessionError::Transport(e.to_string())));
                    }
                }
                Ok(Message::Close(_)) => return None,
                Ok(_) => continue,
                Err(e) => return Some(Err(SessionError::Transport(e.to_string()))),
            }
        }
    }

    async fn close(&mut self) -> SessionResult<()> {
        // A close failure at teardown is not actionable
        let _ = self.inner.close(None).await;
        Ok(())
    }
}
