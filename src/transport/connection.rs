//! Peer connection and event loop.
//!
//! A [`Peer`] owns one WebSocket stream. It spawns a tokio task that:
//!
//! - Translates incoming frames into [`PeerEvent`]s on a shared channel
//! - Writes outgoing messages and close frames sent through the handle
//! - Reports a single [`PeerEvent::Closed`] when the stream ends
//!
//! Every event carries the peer's [`PeerId`] so a consumer that replaces
//! peers can ignore events from ones it no longer holds.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::error::ProtocolError;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Close code reported when the peer sent a close frame without a code.
pub const CLOSE_NO_STATUS: u16 = 1005;

/// Close code reported when the stream ended without a close frame.
pub const CLOSE_ABNORMAL: u16 = 1006;

/// Normal closure.
pub const CLOSE_NORMAL: u16 = 1000;

// ============================================================================
// Types
// ============================================================================

/// Identifies one accepted or established connection.
pub type PeerId = u64;

/// Something that happened on a peer connection.
#[derive(Debug)]
pub enum PeerEvent {
    /// Text or binary data. Binary payloads are decoded lossily.
    Message(String),
    /// Ping received (answered automatically).
    Ping(Vec<u8>),
    /// Pong received.
    Pong(Vec<u8>),
    /// Transport error. A [`PeerEvent::Closed`] follows.
    Error(Error),
    /// Stream ended. Sent exactly once, last.
    Closed {
        /// Close code from the peer's close frame, or 1005/1006.
        code: u16,
        /// Close reason, empty if none.
        reason: String,
    },
}

/// A [`PeerEvent`] tagged with its source.
#[derive(Debug)]
pub struct PeerNotice {
    /// Connection the event came from.
    pub peer: PeerId,
    /// The event.
    pub event: PeerEvent,
}

/// Internal commands for the event loop.
#[derive(Debug)]
enum PeerCommand {
    /// Write a message.
    Send(Message),
    /// Start the closing handshake.
    Close { code: u16, reason: String },
}

// ============================================================================
// Peer
// ============================================================================

/// Handle to a live WebSocket connection.
///
/// Dropping the handle starts a graceful close.
#[derive(Debug)]
pub struct Peer {
    /// Connection id.
    id: PeerId,
    /// Channel for sending commands to the event loop.
    command_tx: mpsc::UnboundedSender<PeerCommand>,
    /// Event loop task.
    task: JoinHandle<()>,
}

impl Peer {
    /// Takes ownership of a WebSocket stream and spawns its event loop.
    pub fn spawn<S>(
        id: PeerId,
        ws_stream: WebSocketStream<S>,
        events: mpsc::UnboundedSender<PeerNotice>,
    ) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(Self::run_event_loop(id, ws_stream, command_rx, events));

        Self {
            id,
            command_tx,
            task,
        }
    }

    /// Returns the connection id.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> PeerId {
        self.id
    }

    /// Sends a text message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the event loop has exited.
    pub fn send_text(&self, text: impl Into<String>) -> Result<()> {
        self.command(PeerCommand::Send(Message::Text(text.into().into())))
    }

    /// Sends a ping frame.
    pub fn ping(&self, data: impl Into<Vec<u8>>) -> Result<()> {
        self.command(PeerCommand::Send(Message::Ping(data.into().into())))
    }

    /// Sends a pong frame.
    pub fn pong(&self, data: impl Into<Vec<u8>>) -> Result<()> {
        self.command(PeerCommand::Send(Message::Pong(data.into().into())))
    }

    /// Starts the closing handshake.
    pub fn close(&self, code: u16, reason: impl Into<String>) -> Result<()> {
        self.command(PeerCommand::Close {
            code,
            reason: reason.into(),
        })
    }

    /// Waits up to `limit` for the event loop to finish.
    ///
    /// Used after [`Peer::close`] so the close frame reaches the wire before
    /// the process exits.
    pub async fn finish(self, limit: Duration) {
        let Self { id, task, .. } = self;
        if timeout(limit, task).await.is_err() {
            debug!(peer = id, "Peer did not finish closing in time");
        }
    }

    fn command(&self, command: PeerCommand) -> Result<()> {
        self.command_tx
            .send(command)
            .map_err(|_| Error::ConnectionClosed)
    }

    /// Event loop that handles WebSocket I/O.
    async fn run_event_loop<S>(
        id: PeerId,
        ws_stream: WebSocketStream<S>,
        mut command_rx: mpsc::UnboundedReceiver<PeerCommand>,
        events: mpsc::UnboundedSender<PeerNotice>,
    ) where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let emit = |event| {
            let _ = events.send(PeerNotice { peer: id, event });
        };

        let (mut ws_write, mut ws_read) = ws_stream.split();
        let mut close_frame: Option<(u16, String)> = None;
        let mut commands_open = true;
        let mut closing = false;

        loop {
            tokio::select! {
                // Incoming frames from the peer
                message = ws_read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            emit(PeerEvent::Message(text.as_str().to_owned()));
                        }

                        Some(Ok(Message::Binary(data))) => {
                            emit(PeerEvent::Message(String::from_utf8_lossy(&data).into_owned()));
                        }

                        Some(Ok(Message::Ping(data))) => emit(PeerEvent::Ping(data.to_vec())),

                        Some(Ok(Message::Pong(data))) => emit(PeerEvent::Pong(data.to_vec())),

                        Some(Ok(Message::Close(frame))) => {
                            let (code, reason) = frame.map_or_else(
                                || (CLOSE_NO_STATUS, String::new()),
                                |f| (u16::from(f.code), f.reason.as_str().to_owned()),
                            );
                            debug!(peer = id, code, "Close frame received");
                            close_frame = Some((code, reason));
                        }

                        Some(Ok(Message::Frame(_))) => {}

                        Some(Err(
                            WsError::ConnectionClosed
                            | WsError::AlreadyClosed
                            | WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake),
                        )) | None => {
                            debug!(peer = id, "WebSocket stream ended");
                            break;
                        }

                        Some(Err(e)) => {
                            warn!(peer = id, error = %e, "WebSocket error");
                            emit(PeerEvent::Error(Error::WebSocket(e)));
                            break;
                        }
                    }
                }

                // Commands from the bridge
                command = command_rx.recv(), if commands_open => {
                    let outgoing = match command {
                        Some(PeerCommand::Send(message)) => message,
                        Some(PeerCommand::Close { code, reason }) => {
                            closing = true;
                            Message::Close(Some(CloseFrame {
                                code: CloseCode::from(code),
                                reason: reason.into(),
                            }))
                        }
                        None => {
                            commands_open = false;
                            if closing || close_frame.is_some() {
                                continue;
                            }
                            trace!(peer = id, "Handle dropped, closing");
                            closing = true;
                            Message::Close(Some(CloseFrame {
                                code: CloseCode::Normal,
                                reason: "".into(),
                            }))
                        }
                    };

                    if let Err(e) = ws_write.send(outgoing).await {
                        match e {
                            WsError::ConnectionClosed | WsError::AlreadyClosed => {}
                            e => {
                                warn!(peer = id, error = %e, "Failed to write frame");
                                emit(PeerEvent::Error(Error::WebSocket(e)));
                            }
                        }
                        break;
                    }
                }
            }
        }

        let (code, reason) = close_frame.unwrap_or((CLOSE_ABNORMAL, String::new()));
        emit(PeerEvent::Closed { code, reason });

        debug!(peer = id, code, "Event loop terminated");
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::net::{TcpListener, TcpStream};
    use tokio_tungstenite::{accept_async, connect_async};

    /// Returns (server side wrapped in a Peer, client side stream, events).
    async fn pair() -> (
        Peer,
        WebSocketStream<tokio_tungstenite::MaybeTlsStream<TcpStream>>,
        mpsc::UnboundedReceiver<PeerNotice>,
    ) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            accept_async(stream).await.expect("handshake")
        });

        let (client, _) = connect_async(format!("ws://{addr}")).await.expect("connect");
        let server_ws = server.await.expect("join");

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        (Peer::spawn(7, server_ws, events_tx), client, events_rx)
    }

    #[tokio::test]
    async fn test_incoming_text_and_binary() {
        let (peer, mut client, mut events) = pair().await;

        client.send(Message::Text("hi".into())).await.expect("send");
        client
            .send(Message::Binary(b"bytes".to_vec().into()))
            .await
            .expect("send");

        let notice = events.recv().await.expect("event");
        assert_eq!(notice.peer, 7);
        assert!(matches!(notice.event, PeerEvent::Message(ref m) if m == "hi"));

        let notice = events.recv().await.expect("event");
        assert!(matches!(notice.event, PeerEvent::Message(ref m) if m == "bytes"));

        drop(peer);
    }

    #[tokio::test]
    async fn test_send_text_reaches_peer() {
        let (peer, mut client, _events) = pair().await;

        peer.send_text("hello").expect("send");

        let message = client.next().await.expect("frame").expect("ok");
        assert_eq!(message, Message::Text("hello".into()));
    }

    #[tokio::test]
    async fn test_remote_close_reports_code() {
        let (_peer, mut client, mut events) = pair().await;

        client
            .close(Some(CloseFrame {
                code: CloseCode::Away,
                reason: "bye".into(),
            }))
            .await
            .expect("close");

        loop {
            let notice = events.recv().await.expect("event");
            if let PeerEvent::Closed { code, reason } = notice.event {
                assert_eq!(code, 1001);
                assert_eq!(reason, "bye");
                break;
            }
        }
    }

    #[tokio::test]
    async fn test_local_close_sends_close_frame() {
        let (peer, mut client, _events) = pair().await;

        peer.close(4000, "done").expect("close");

        let message = client.next().await.expect("frame").expect("ok");
        match message {
            Message::Close(Some(frame)) => {
                assert_eq!(u16::from(frame.code), 4000);
                assert_eq!(frame.reason.as_str(), "done");
            }
            other => panic!("expected close frame, got {other:?}"),
        }

        peer.finish(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn test_ping_is_reported() {
        let (_peer, mut client, mut events) = pair().await;

        client
            .send(Message::Ping(b"beat".to_vec().into()))
            .await
            .expect("ping");

        let notice = events.recv().await.expect("event");
        assert!(matches!(notice.event, PeerEvent::Ping(ref d) if d == b"beat"));
    }
}
