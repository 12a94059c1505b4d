//! wsbridge - Interactive WebSocket client and single-peer server.
//!
//! Bridges a terminal to one WebSocket connection: typed lines are sent as
//! text messages, incoming messages are printed.
//!
//! # Architecture
//!
//! Two producers feed one consumer loop per mode:
//!
//! - **Line source**: a task reading stdin and watching for Ctrl+C
//! - **Peer task**: one per WebSocket stream, translating frames to events
//! - **Bridge loop**: the only owner of the renderer, the console switch and
//!   the held peer
//!
//! # Quick Start
//!
//! ```no_run
//! use wsbridge::{ClientBridge, Mode, Renderer, Result, SessionConfig, Style};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = SessionConfig::new(Mode::Connect {
//!         url: "ws://localhost:8080".into(),
//!     });
//!     let renderer = Renderer::stdout(Style::default());
//!
//!     let bridge = ClientBridge::new(config, renderer);
//!     let console = bridge.console_source();
//!     bridge.run(console).await
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`bridge`] | Client and server bridges, [`bridge::Session`] |
//! | [`config`] | CLI surface and [`SessionConfig`] |
//! | [`console`] | Line source, renderer, passphrase prompt |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`transport`] | Peer connections, listener, TLS |

// ============================================================================
// Modules
// ============================================================================

/// Connection bridges.
///
/// - [`ClientBridge`] - `--connect`
/// - [`ServerBridge`] - `--listen`
pub mod bridge;

/// Session configuration.
///
/// Use [`Args::into_config()`] to validate command-line flags.
pub mod config;

/// Terminal input and output.
pub mod console;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// WebSocket transport layer.
///
/// Peer event loops, the listening endpoint and client TLS.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Bridge types
pub use bridge::{ClientBridge, ServerBridge, Session};

// Config types
pub use config::{Args, Mode, Passphrase, SessionConfig, TlsFiles};

// Console types
pub use console::{Renderer, Style};

// Error types
pub use error::{Error, Result};
