//! Outbound connection bridge (`--connect`).
//!
//! Connects to the configured URL and then relays between the terminal and
//! the peer until either side closes.
//!
//! # States
//!
//! ```text
//! Connecting ──open──► Open ──close──► Closed
//!     │                  │
//!     └──error───────────┴──error──► session ends non-zero
//! ```
//!
//! In execute mode the command is sent once on open and the connection is
//! closed after `--wait`.

// ============================================================================
// Imports
// ============================================================================

use std::future::pending;

use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::header::{
    HOST, ORIGIN, SEC_WEBSOCKET_PROTOCOL, SEC_WEBSOCKET_VERSION,
};
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::{Connector, connect_async_tls_with_config};
use tracing::{debug, info, trace};

use super::{Session, disconnected_message};
use crate::config::{Mode, Passphrase, SessionConfig};
use crate::console::{
    ConsoleEvent, ConsoleHandle, ConsoleState, LineSource, Renderer, prompt_passphrase,
};
use crate::error::{Error, Result};
use crate::transport::{PeerEvent, tls};

// ============================================================================
// Constants
// ============================================================================

const PASSPHRASE_PROMPT: &str = "Passphrase: ";

// ============================================================================
// ClientBridge
// ============================================================================

/// Client-mode bridge.
pub struct ClientBridge {
    session: Session,
}

impl ClientBridge {
    /// Creates a bridge. The console is always active in client mode.
    #[must_use]
    pub fn new(config: SessionConfig, renderer: Renderer) -> Self {
        let console = ConsoleHandle::new(ConsoleState::Active);
        Self {
            session: Session::new(config, renderer, console),
        }
    }

    /// Returns the console switch shared with the line source.
    #[inline]
    #[must_use]
    pub fn console_handle(&self) -> ConsoleHandle {
        self.session.console()
    }

    /// Builds the terminal line source for this mode.
    ///
    /// Execute mode only listens for Ctrl+C; stdin is never read.
    #[must_use]
    pub fn console_source(&self) -> LineSource {
        if self.session.config().is_execute() {
            LineSource::interrupt_only(self.console_handle())
        } else {
            LineSource::stdin(self.console_handle())
        }
    }

    /// Prompts for the key passphrase if `--passphrase` was given without a
    /// value.
    ///
    /// Call before [`ClientBridge::console_source`] so the prompt has the
    /// terminal to itself. [`ClientBridge::run`] prompts otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Interrupted`] if the prompt was cancelled.
    pub async fn resolve_passphrase(&mut self) -> Result<()> {
        let result = self.prompt_if_requested().await;
        if let Err(e) = &result
            && !e.is_interrupt()
        {
            self.session.error(e);
        }
        result
    }

    /// Runs the session to completion.
    ///
    /// # Errors
    ///
    /// Returns the transport, TLS or handshake error that ended the session.
    /// The error has already been rendered.
    pub async fn run(mut self, mut console: LineSource) -> Result<()> {
        let result = self.event_loop(&mut console).await;
        if let Err(e) = &result
            && !e.is_interrupt()
        {
            self.session.error(e);
        }
        result
    }

    async fn event_loop(&mut self, console: &mut LineSource) -> Result<()> {
        let Mode::Connect { url } = &self.session.config().mode else {
            return Err(Error::usage("client bridge requires --connect"));
        };
        let url = url.clone();

        self.prompt_if_requested().await?;
        let passphrase = match &self.session.config().tls.passphrase {
            Passphrase::Given(passphrase) => Some(passphrase.clone()),
            Passphrase::None | Passphrase::Prompt => None,
        };
        let request = self.build_request(&url)?;
        let connector = self.connector(&request, passphrase.as_deref()).await?;

        debug!(%url, "Connecting");
        let connect = connect_async_tls_with_config(request, None, false, Some(connector));
        tokio::pin!(connect);

        let (stream, response) = loop {
            tokio::select! {
                result = &mut connect => {
                    break result.map_err(|e| Error::connection(e.to_string()))?;
                }
                event = console.next() => match event {
                    Some(ConsoleEvent::Line(_)) => trace!("Dropping line typed before open"),
                    Some(ConsoleEvent::Close) | None => {
                        debug!("Console closed while connecting");
                        return Ok(());
                    }
                },
            }
        };
        info!(%url, status = %response.status(), "Connected");

        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        self.session.accept_peer(stream, events_tx);

        let deadline = self.on_open()?;

        loop {
            tokio::select! {
                Some(notice) = events_rx.recv() => {
                    let Some(event) = self.session.render_peer_event(notice.event) else {
                        continue;
                    };
                    match event {
                        PeerEvent::Error(e) => return Err(e),
                        PeerEvent::Closed { code, reason } => {
                            if !self.session.config().is_execute() {
                                self.session.control(&disconnected_message(code, &reason));
                            }
                            self.session.clear();
                            self.session.clear_peer();
                            return Ok(());
                        }
                        _ => {}
                    }
                }

                event = console.next() => match event {
                    Some(ConsoleEvent::Line(line)) => self.session.forward_line(line),
                    Some(ConsoleEvent::Close) | None => {
                        self.session.close_peer().await;
                        return Ok(());
                    }
                },

                () = wait_until(deadline) => {
                    debug!("Execute wait elapsed, closing");
                    self.session.close_peer().await;
                    return Ok(());
                }
            }
        }
    }

    /// Handles the open transition. Returns the execute-mode close deadline.
    fn on_open(&mut self) -> Result<Option<Instant>> {
        let Some(command) = self.session.config().execute.clone() else {
            self.session.control("Connected (press CTRL+C to quit)");
            return Ok(None);
        };

        let deadline = Instant::now() + self.session.config().wait;
        if let Some(peer) = self.session.peer() {
            peer.send_text(command)?;
        }
        Ok(Some(deadline))
    }

    async fn prompt_if_requested(&mut self) -> Result<()> {
        if self.session.config().tls.passphrase == Passphrase::Prompt {
            let passphrase = prompt_passphrase(PASSPHRASE_PROMPT).await?;
            self.session.config_mut().tls.passphrase = Passphrase::Given(passphrase);
        }
        Ok(())
    }

    /// Builds the handshake request with every configured header.
    fn build_request(&self, url: &str) -> Result<Request> {
        let config = self.session.config();
        let mut request = url.into_client_request()?;
        let headers = request.headers_mut();

        for (name, value) in &config.headers {
            headers.insert(name.clone(), value.clone());
        }

        let overrides = [
            (ORIGIN, config.origin.as_deref()),
            (HOST, config.host.as_deref()),
            (SEC_WEBSOCKET_PROTOCOL, config.subprotocol.as_deref()),
        ];
        for (name, value) in overrides {
            if let Some(value) = value {
                headers.insert(name.clone(), header_value(&name, value)?);
            }
        }

        if let Some(version) = config.protocol_version {
            headers.insert(SEC_WEBSOCKET_VERSION, HeaderValue::from(u16::from(version)));
        }

        Ok(request)
    }

    async fn connector(&self, request: &Request, passphrase: Option<&str>) -> Result<Connector> {
        if request.uri().scheme_str() != Some("wss") {
            return Ok(Connector::Plain);
        }

        let config = self.session.config();
        tls::connector(&config.tls, passphrase, config.check_certificates).await
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn header_value(name: &HeaderName, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|_| Error::usage(format!("Invalid {name} header value")))
}

/// Resolves at `deadline`, or never if there is none.
async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => pending().await,
    }
}

// ============================================================================
// Tests
// ============================================================================
