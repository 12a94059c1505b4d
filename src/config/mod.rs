//! Session configuration.
//!
//! Turns parsed command-line flags into a validated [`SessionConfig`]
//! that the bridges consume.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `cli` | Command-line surface (clap) |
//! | `headers` | Header flags, Basic-Auth and URL normalization |

// ============================================================================
// Submodules
// ============================================================================

/// Command-line surface.
pub mod cli;

/// Header parsing, Basic-Auth synthesis and URL normalization.
pub mod headers;

// ============================================================================
// Imports
// ============================================================================

use std::path::PathBuf;
use std::time::Duration;

use tokio_tungstenite::tungstenite::http::HeaderMap;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::Args;
pub use headers::{basic_auth, normalize_url, parse_header, parse_headers};

// ============================================================================
// Constants
// ============================================================================

/// Default delay between sending `--execute` and closing.
pub const DEFAULT_WAIT: Duration = Duration::from_secs(2);

/// Protocol versions accepted by `--protocol`.
pub const SUPPORTED_PROTOCOL_VERSIONS: [u8; 2] = [8, 13];

// ============================================================================
// Mode
// ============================================================================

/// Which side of the connection this session plays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Accept a single inbound peer on the given port.
    Listen {
        /// Port to bind.
        port: u16,
    },
    /// Connect out to the given (normalized) URL.
    Connect {
        /// Target URL with a scheme.
        url: String,
    },
}

// ============================================================================
// Passphrase
// ============================================================================

/// Where the private key passphrase comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Passphrase {
    /// No passphrase.
    #[default]
    None,
    /// Ask interactively (masked) before connecting.
    Prompt,
    /// Supplied on the command line.
    Given(String),
}

// ============================================================================
// TlsFiles
// ============================================================================

/// Client TLS material, as file paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsFiles {
    /// Extra CA certificates (PEM).
    pub ca: Option<PathBuf>,
    /// Client certificate chain (PEM).
    pub cert: Option<PathBuf>,
    /// Client private key (PEM, optionally encrypted).
    pub key: Option<PathBuf>,
    /// Passphrase for an encrypted key.
    pub passphrase: Passphrase,
}

// ============================================================================
// SessionConfig
// ============================================================================

/// Validated configuration for one run of the tool.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Listen or connect.
    pub mode: Mode,

    /// `Sec-WebSocket-Version` override.
    pub protocol_version: Option<u8>,

    /// `Origin` header.
    pub origin: Option<String>,

    /// `Host` header override.
    pub host: Option<String>,

    /// Requested subprotocol.
    pub subprotocol: Option<String>,

    /// Custom headers with the Basic-Auth header already merged in.
    pub headers: HeaderMap,

    /// Message to send on open before closing (execute mode).
    pub execute: Option<String>,

    /// Delay before closing in execute mode.
    pub wait: Duration,

    /// Emit ANSI color codes.
    pub color: bool,

    /// Verify server certificates.
    pub check_certificates: bool,

    /// Client TLS material.
    pub tls: TlsFiles,

    /// Interpret lines starting with `/` as commands.
    pub slash_commands: bool,

    /// Print received ping and pong frames.
    pub show_ping_pong: bool,
}

impl SessionConfig {
    /// Creates a configuration with defaults for the given mode.
    #[must_use]
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            protocol_version: None,
            origin: None,
            host: None,
            subprotocol: None,
            headers: HeaderMap::new(),
            execute: None,
            wait: DEFAULT_WAIT,
            color: true,
            check_certificates: true,
            tls: TlsFiles::default(),
            slash_commands: false,
            show_ping_pong: false,
        }
    }

    /// Returns `true` in execute mode (non-interactive).
    #[inline]
    #[must_use]
    pub fn is_execute(&self) -> bool {
        self.execute.is_some()
    }
}

// ============================================================================
// Tests
// ============================================================================
