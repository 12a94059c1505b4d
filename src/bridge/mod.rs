//! Connection bridges.
//!
//! A bridge is the single consumer that serializes terminal events and peer
//! events into renderer output and socket writes. Both modes share a
//! [`Session`] context holding the configuration, the renderer, the console
//! pause switch and at most one [`Peer`].
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `client` | Outbound connection (`--connect`) |
//! | `server` | Single-peer listener (`--listen`) |
//! | `slash` | `/ping`, `/pong`, `/close` commands |

// ============================================================================
// Submodules
// ============================================================================

/// Outbound connection bridge.
pub mod client;

/// Single-peer listening bridge.
pub mod server;

/// Slash commands.
pub mod slash;

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, trace};

use crate::config::SessionConfig;
use crate::console::{Category, Color, ConsoleHandle, Renderer};
use crate::error::Error;
use crate::transport::connection::CLOSE_NORMAL;
use crate::transport::{Peer, PeerEvent, PeerId, PeerNotice};

use slash::SlashCommand;

// ============================================================================
// Re-exports
// ============================================================================

pub use client::ClientBridge;
pub use server::ServerBridge;

// ============================================================================
// Constants
// ============================================================================

/// How long a closing peer gets to flush its close frame on shutdown.
const CLOSE_FLUSH_TIMEOUT: Duration = Duration::from_millis(500);

// ============================================================================
// Session
// ============================================================================

/// Per-run context threaded through the bridge handlers.
///
/// Only the owning bridge loop touches it, so no locking is needed beyond
/// the console switch it shares with the line source task.
pub struct Session {
    /// Validated configuration.
    config: SessionConfig,
    /// Terminal output.
    renderer: Renderer,
    /// Pause switch of the line source.
    console: ConsoleHandle,
    /// The active connection, if any.
    peer: Option<Peer>,
    /// Id handed to the next accepted peer.
    next_peer_id: PeerId,
}

impl Session {
    /// Creates a session with no peer.
    #[must_use]
    pub fn new(config: SessionConfig, renderer: Renderer, console: ConsoleHandle) -> Self {
        Self {
            config,
            renderer,
            console,
            peer: None,
            next_peer_id: 1,
        }
    }

    /// Returns the configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Returns the configuration for in-place updates.
    #[inline]
    pub fn config_mut(&mut self) -> &mut SessionConfig {
        &mut self.config
    }

    /// Returns the console pause switch.
    #[inline]
    #[must_use]
    pub fn console(&self) -> ConsoleHandle {
        self.console.clone()
    }

    // ========================================================================
    // Peer Slot
    // ========================================================================

    /// Promotes `stream` to the active connection unless one is held.
    ///
    /// Check and store happen together; a stream that loses is dropped
    /// without a close frame and never produces events.
    pub fn accept_peer<S>(
        &mut self,
        stream: WebSocketStream<S>,
        events: mpsc::UnboundedSender<PeerNotice>,
    ) -> Option<PeerId>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        if self.peer.is_some() {
            drop(stream);
            return None;
        }

        let id = self.next_peer_id;
        self.next_peer_id += 1;
        self.peer = Some(Peer::spawn(id, stream, events));
        Some(id)
    }

    /// Returns the held peer.
    #[inline]
    #[must_use]
    pub fn peer(&self) -> Option<&Peer> {
        self.peer.as_ref()
    }

    /// Releases the active connection.
    pub fn clear_peer(&mut self) -> Option<Peer> {
        self.peer.take()
    }

    /// Returns `true` if `id` is the held peer.
    #[inline]
    #[must_use]
    pub fn is_current(&self, id: PeerId) -> bool {
        self.peer.as_ref().is_some_and(|peer| peer.id() == id)
    }

    /// Closes the held peer, if any, and waits briefly for the close frame
    /// to go out.
    pub async fn close_peer(&mut self) {
        if let Some(peer) = self.peer.take() {
            let _ = peer.close(CLOSE_NORMAL, "");
            peer.finish(CLOSE_FLUSH_TIMEOUT).await;
        }
    }

    // ========================================================================
    // Rendering
    // ========================================================================

    /// Prints a control message.
    pub fn control(&mut self, message: &str) {
        self.renderer.print(Category::Control, message, Color::Green);
    }

    /// Prints an incoming message.
    pub fn incoming(&mut self, message: &str) {
        self.renderer.print(Category::Incoming, message, Color::Blue);
    }

    /// Prints an error.
    pub fn error(&mut self, error: &Error) {
        self.renderer
            .print(Category::Error, &error.to_string(), Color::Yellow);
    }

    /// Renders a fresh prompt.
    pub fn prompt(&mut self) {
        self.renderer.prompt();
    }

    /// Erases the current input line.
    pub fn clear(&mut self) {
        self.renderer.clear();
    }

    /// Renders the data-carrying peer events shared by both modes.
    ///
    /// Returns the event back if it needs mode-specific handling.
    pub fn render_peer_event(&mut self, event: PeerEvent) -> Option<PeerEvent> {
        match event {
            PeerEvent::Message(message) => self.incoming(&message),
            PeerEvent::Ping(data) => {
                if self.config.show_ping_pong {
                    self.incoming(&format!(
                        "Received ping (data: \"{}\")",
                        String::from_utf8_lossy(&data)
                    ));
                }
            }
            PeerEvent::Pong(data) => {
                if self.config.show_ping_pong {
                    self.incoming(&format!(
                        "Received pong (data: \"{}\")",
                        String::from_utf8_lossy(&data)
                    ));
                }
            }
            other => return Some(other),
        }
        None
    }

    // ========================================================================
    // Input
    // ========================================================================

    /// Forwards a typed line to the held peer and re-prompts.
    ///
    /// Lines are dropped when no peer is held.
    pub fn forward_line(&mut self, line: String) {
        let Some(peer) = &self.peer else {
            trace!("No peer, dropping line");
            return;
        };

        let sent = if self.config.slash_commands && line.starts_with('/') {
            SlashCommand::parse(&line).and_then(|command| match command {
                SlashCommand::Ping(data) => peer.ping(data),
                SlashCommand::Pong(data) => peer.pong(data),
                SlashCommand::Close { code, reason } => peer.close(code, reason),
            })
        } else {
            peer.send_text(line)
        };

        match sent {
            Ok(()) => self.prompt(),
            Err(Error::ConnectionClosed) => debug!("Peer gone before line was sent"),
            Err(e) => self.error(&e),
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Formats the disconnect notice.
#[must_use]
pub fn disconnected_message(code: u16, reason: &str) -> String {
    if reason.is_empty() {
        format!("Disconnected (code: {code})")
    } else {
        format!("Disconnected (code: {code}, reason: \"{reason}\")")
    }
}

// ============================================================================
// Tests
// ============================================================================
