//! Single-peer listening bridge (`--listen`).
//!
//! Accepts WebSocket clients on a port but holds at most one at a time.
//! While no client is held the console is paused and typed lines are
//! discarded.
//!
//! # Connection Flow
//!
//! 1. Bind and print `Listening on port N`
//! 2. Each TCP stream is upgraded in its own task
//! 3. The first finished upgrade becomes the peer; later ones are dropped
//! 4. On peer close the slot is freed and the console paused again

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, Ipv4Addr};

use tokio::sync::mpsc;
use tracing::{debug, info, trace};

use super::{Session, disconnected_message};
use crate::config::{Mode, SessionConfig};
use crate::console::{ConsoleEvent, ConsoleHandle, ConsoleState, LineSource, Renderer};
use crate::error::{Error, Result};
use crate::transport::{Listener, PeerEvent, PeerNotice, Upgraded, spawn_upgrade};

// ============================================================================
// ServerBridge
// ============================================================================

/// Server-mode bridge.
pub struct ServerBridge {
    /// Session state.
    session: Session,
    /// Pre-bound listener; bound on [`ServerBridge::run`] otherwise.
    listener: Option<Listener>,
}

impl ServerBridge {
    /// Creates a bridge that binds `0.0.0.0:<port>` when run.
    ///
    /// The console starts paused.
    #[must_use]
    pub fn new(config: SessionConfig, renderer: Renderer) -> Self {
        let console = ConsoleHandle::new(ConsoleState::Paused);
        Self {
            session: Session::new(config, renderer, console),
            listener: None,
        }
    }

    /// Creates a bridge over an already bound listener.
    #[must_use]
    pub fn with_listener(config: SessionConfig, renderer: Renderer, listener: Listener) -> Self {
        let mut bridge = Self::new(config, renderer);
        bridge.listener = Some(listener);
        bridge
    }

    /// Returns the console switch shared with the line source.
    #[inline]
    #[must_use]
    pub fn console_handle(&self) -> ConsoleHandle {
        self.session.console()
    }

    /// Builds the stdin line source for this mode.
    #[must_use]
    pub fn console_source(&self) -> LineSource {
        LineSource::stdin(self.console_handle())
    }

    /// Runs the session until the console closes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Listen`] if binding or accepting fails. The error has
    /// already been rendered.
    pub async fn run(mut self, mut console: LineSource) -> Result<()> {
        let result = self.event_loop(&mut console).await;
        if let Err(e) = &result {
            self.session.error(e);
        }
        result
    }

    async fn event_loop(&mut self, console: &mut LineSource) -> Result<()> {
        let listener = match self.listener.take() {
            Some(listener) => listener,
            None => {
                let Mode::Listen { port } = self.session.config().mode else {
                    return Err(Error::usage("server bridge requires --listen"));
                };
                Listener::bind(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port).await?
            }
        };

        info!(port = listener.port(), "Listening");
        self.session.control(&format!(
            "Listening on port {} (press CTRL+C to quit)",
            listener.port()
        ));

        let (upgrades_tx, mut upgrades_rx) = mpsc::unbounded_channel();
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, addr) = accepted?;
                    spawn_upgrade(stream, addr, upgrades_tx.clone());
                }

                Some(upgraded) = upgrades_rx.recv() => self.on_upgrade(upgraded, &events_tx),

                Some(notice) = events_rx.recv() => self.on_peer_event(notice),

                event = console.next() => match event {
                    Some(ConsoleEvent::Line(line)) => self.session.forward_line(line),
                    Some(ConsoleEvent::Close) | None => {
                        self.session.close_peer().await;
                        return Ok(());
                    }
                },
            }
        }
    }

    /// Promotes the upgraded stream if no peer is held.
    fn on_upgrade(&mut self, upgraded: Upgraded, events: &mpsc::UnboundedSender<PeerNotice>) {
        let Upgraded { stream, addr } = upgraded;

        match self.session.accept_peer(stream, events.clone()) {
            Some(id) => {
                debug!(peer = id, %addr, "Client accepted");
                self.session.console().resume();
                self.session.prompt();
                self.session.control("Client connected");
            }
            None => debug!(%addr, "Client rejected, a peer is already connected"),
        }
    }

    fn on_peer_event(&mut self, notice: PeerNotice) {
        if !self.session.is_current(notice.peer) {
            trace!(peer = notice.peer, "Ignoring event from released peer");
            return;
        }

        match self.session.render_peer_event(notice.event) {
            Some(PeerEvent::Error(e)) => self.session.error(&e),
            Some(PeerEvent::Closed { code, reason }) => {
                debug!(peer = notice.peer, code, "Client disconnected");
                self.session.control(&disconnected_message(code, &reason));
                self.session.clear();
                self.session.console().pause();
                self.session.clear_peer();
            }
            _ => {}
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use futures_util::{SinkExt, StreamExt};
    use tokio::net::TcpStream;
    use tokio::task::JoinHandle;
    use tokio::time::timeout;
    use tokio_tungstenite::tungstenite::Message;
    use tokio_tungstenite::tungstenite::protocol::CloseFrame;
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
    use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

    use crate::console::Style;
    use crate::console::renderer::SharedBuffer;

    type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

    struct Harness {
        buffer: SharedBuffer,
        port: u16,
        console: ConsoleHandle,
        lines: mpsc::UnboundedSender<ConsoleEvent>,
        task: JoinHandle<Result<()>>,
    }

    async fn start() -> Harness {
        let listener = Listener::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0)
            .await
            .expect("bind");
        let port = listener.port();
        let buffer = SharedBuffer::default();

        let bridge = ServerBridge::with_listener(
            SessionConfig::new(Mode::Listen { port }),
            buffer.renderer(true, Style::for_session(false, false)),
            listener,
        );
        let console = bridge.console_handle();
        let (source, lines) = LineSource::channel(bridge.console_handle());
        let task = tokio::spawn(bridge.run(source));

        buffer.wait_for("Listening on port", 1).await;
        Harness {
            buffer,
            port,
            console,
            lines,
            task,
        }
    }

    async fn connect(port: u16) -> Client {
        let (client, _) = connect_async(format!("ws://127.0.0.1:{port}"))
            .await
            .expect("connect");
        client
    }

    async fn next_text(client: &mut Client) -> String {
        let next = timeout(Duration::from_secs(5), client.next())
            .await
            .expect("timed out");
        match next {
            Some(Ok(Message::Text(text))) => text.as_str().to_owned(),
            other => panic!("expected text, got {other:?}"),
        }
    }

    fn send_line(harness: &Harness, line: &str) {
        harness
            .lines
            .send(ConsoleEvent::Line(line.into()))
            .expect("line");
    }

    #[tokio::test]
    async fn test_listening_banner_and_paused_console() {
        let harness = start().await;

        assert!(harness.buffer.contents().contains(&format!(
            "Listening on port {} (press CTRL+C to quit)",
            harness.port
        )));
        assert!(harness.console.is_paused());

        harness.lines.send(ConsoleEvent::Close).expect("close");
        harness.task.await.expect("join").expect("run");
    }

    #[tokio::test]
    async fn test_single_peer_lifecycle() {
        let harness = start().await;

        // First client is promoted.
        let mut first = connect(harness.port).await;
        harness.buffer.wait_for("Client connected", 1).await;
        assert!(!harness.console.is_paused());

        send_line(&harness, "hello");
        assert_eq!(next_text(&mut first).await, "hello");

        // Second client is dropped without a close frame.
        let mut second = connect(harness.port).await;
        match timeout(Duration::from_secs(5), second.next())
            .await
            .expect("timed out")
        {
            None | Some(Err(_)) => {}
            Some(Ok(message)) => panic!("rejected client got {message:?}"),
        }
        assert_eq!(harness.buffer.contents().matches("Client connected").count(), 1);

        send_line(&harness, "still first");
        assert_eq!(next_text(&mut first).await, "still first");

        // Disconnect frees the slot and pauses the console.
        first
            .close(Some(CloseFrame {
                code: CloseCode::Normal,
                reason: "".into(),
            }))
            .await
            .expect("close");
        harness.buffer.wait_for("Disconnected (code: 1000)", 1).await;
        assert!(harness.console.is_paused());

        // A line with no peer goes nowhere.
        send_line(&harness, "dropped");
        tokio::time::sleep(Duration::from_millis(50)).await;

        // The next client gets the following line first.
        let mut third = connect(harness.port).await;
        harness.buffer.wait_for("Client connected", 2).await;
        send_line(&harness, "welcome");
        assert_eq!(next_text(&mut third).await, "welcome");

        harness.lines.send(ConsoleEvent::Close).expect("close");
        harness.task.await.expect("join").expect("run");

        match timeout(Duration::from_secs(5), third.next())
            .await
            .expect("timed out")
        {
            Some(Ok(Message::Close(Some(frame)))) => assert_eq!(frame.code, CloseCode::Normal),
            other => panic!("expected close frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_incoming_message_is_rendered() {
        let harness = start().await;

        let mut client = connect(harness.port).await;
        harness.buffer.wait_for("Client connected", 1).await;
        client
            .send(Message::Text("from client".into()))
            .await
            .expect("send");

        harness.buffer.wait_for("< from client", 1).await;

        harness.lines.send(ConsoleEvent::Close).expect("close");
        harness.task.await.expect("join").expect("run");
    }

    #[tokio::test]
    async fn test_port_in_use_is_rendered_error() {
        let taken = Listener::bind(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0)
            .await
            .expect("bind");
        let buffer = SharedBuffer::default();

        let bridge = ServerBridge::new(
            SessionConfig::new(Mode::Listen { port: taken.port() }),
            buffer.renderer(true, Style::for_session(false, false)),
        );
        let (source, _lines) = LineSource::channel(bridge.console_handle());

        let err = bridge.run(source).await.expect_err("must fail");
        assert!(matches!(err, Error::Listen { .. }));
        assert!(buffer.contents().contains("error: Failed to listen on port"));
    }
}
