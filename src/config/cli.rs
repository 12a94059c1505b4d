//! Command-line surface.
//!
//! Exactly one of `--listen` / `--connect` is required; clap rejects
//! conflicting or missing modes before [`Args::into_config`] runs.

// ============================================================================
// Imports
// ============================================================================

use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgGroup, Parser};
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tracing::warn;

use crate::error::{Error, Result};

use super::headers::{basic_auth, normalize_url, parse_headers};
use super::{Mode, Passphrase, SUPPORTED_PROTOCOL_VERSIONS, SessionConfig, TlsFiles};

// ============================================================================
// Args
// ============================================================================

/// Interactive WebSocket client and single-peer server.
#[derive(Debug, Clone, Parser)]
#[command(name = "wsbridge", version, about)]
#[command(group(ArgGroup::new("mode").required(true).args(["listen", "connect"])))]
pub struct Args {
    /// Listen on port
    #[arg(short, long, value_name = "PORT")]
    pub listen: Option<u16>,

    /// Connect to a WebSocket server
    #[arg(short, long, value_name = "URL")]
    pub connect: Option<String>,

    /// Optional protocol version
    #[arg(short = 'p', long = "protocol", value_name = "VERSION")]
    pub protocol: Option<u8>,

    /// Optional origin
    #[arg(short, long)]
    pub origin: Option<String>,

    /// Execute command after connecting
    #[arg(short = 'x', long, value_name = "COMMAND")]
    pub execute: Option<String>,

    /// Wait given seconds after executing command
    #[arg(short, long, value_name = "SECONDS")]
    pub wait: Option<f64>,

    /// Optional host
    #[arg(long)]
    pub host: Option<String>,

    /// Optional subprotocol
    #[arg(short, long, value_name = "PROTOCOL")]
    pub subprotocol: Option<String>,

    /// Do not check for unauthorized certificates
    #[arg(short = 'n', long = "no-check")]
    pub no_check: bool,

    /// Set an HTTP header. Repeat to set multiple
    #[arg(short = 'H', long = "header", value_name = "KEY:VALUE")]
    pub headers: Vec<String>,

    /// Add basic HTTP authentication header
    #[arg(long, value_name = "USER:PASSWORD")]
    pub auth: Option<String>,

    /// Specify a Certificate Authority
    #[arg(long, value_name = "PATH")]
    pub ca: Option<PathBuf>,

    /// Specify a Client SSL Certificate
    #[arg(long, value_name = "PATH")]
    pub cert: Option<PathBuf>,

    /// Specify a Client SSL Certificate's key
    #[arg(long, value_name = "PATH")]
    pub key: Option<PathBuf>,

    /// Pass phrase for the key. Prompts when given without a value
    #[arg(long, value_name = "PASSPHRASE", num_args = 0..=1)]
    pub passphrase: Option<Option<String>>,

    /// Run without color
    #[arg(long = "no-color")]
    pub no_color: bool,

    /// Enable slash commands for control frames (/ping, /pong, /close [code [reason]])
    #[arg(long)]
    pub slash: bool,

    /// Print a notification when a ping or pong is received
    #[arg(short = 'P', long = "show-ping-pong")]
    pub show_ping_pong: bool,

    /// Enable debug logging on stderr
    #[arg(long)]
    pub debug: bool,
}

// ============================================================================
// Conversion
// ============================================================================

impl Args {
    /// Validates the flags and builds a [`SessionConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Usage`] for malformed headers, URLs, wait values or
    /// unsupported protocol versions.
    pub fn into_config(self) -> Result<SessionConfig> {
        let mode = match (self.listen, self.connect) {
            (Some(port), None) => Mode::Listen { port },
            (None, Some(url)) => Mode::Connect {
                url: normalize_url(&url)?,
            },
            (Some(_), Some(_)) => {
                return Err(Error::usage("--listen and --connect are mutually exclusive"));
            }
            (None, None) => return Err(Error::usage("one of --listen or --connect is required")),
        };

        if let Some(version) = self.protocol
            && !SUPPORTED_PROTOCOL_VERSIONS.contains(&version)
        {
            return Err(Error::usage(format!(
                "Unsupported protocol version {version} (expected 8 or 13)"
            )));
        }

        let wait = match self.wait {
            Some(seconds) => Duration::try_from_secs_f64(seconds)
                .map_err(|_| Error::usage(format!("Invalid wait \"{seconds}\"")))?,
            None => super::DEFAULT_WAIT,
        };

        if matches!(mode, Mode::Listen { .. }) && self.execute.is_some() {
            warn!("--execute has no effect with --listen");
        }

        // Custom headers first so --auth wins over an explicit Authorization.
        let mut headers = parse_headers(&self.headers)?;
        if let Some(credentials) = &self.auth {
            headers.insert(AUTHORIZATION, basic_auth(credentials)?);
        }

        let passphrase = match self.passphrase {
            None => Passphrase::None,
            Some(None) => Passphrase::Prompt,
            Some(Some(value)) => Passphrase::Given(value),
        };

        Ok(SessionConfig {
            mode,
            protocol_version: self.protocol,
            origin: self.origin,
            host: self.host,
            subprotocol: self.subprotocol,
            headers,
            execute: self.execute,
            wait,
            color: !self.no_color,
            check_certificates: !self.no_check,
            tls: TlsFiles {
                ca: self.ca,
                cert: self.cert,
                key: self.key,
                passphrase,
            },
            slash_commands: self.slash,
            show_ping_pong: self.show_ping_pong,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
