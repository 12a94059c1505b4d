//! Error types for wsbridge.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use wsbridge::{Result, SessionConfig};
//!
//! fn example(args: Args) -> Result<SessionConfig> {
//!     let config = args.into_config()?;
//!     Ok(config)
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Usage | [`Error::Usage`] |
//! | Transport | [`Error::Connection`], [`Error::ConnectionClosed`], [`Error::Listen`], [`Error::Tls`] |
//! | Session | [`Error::Interrupted`] |
//! | External | [`Error::Io`], [`Error::WebSocket`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Usage Errors
    // ========================================================================
    /// Invalid flag value or combination.
    ///
    /// Returned before any connection is attempted.
    #[error("{message}")]
    Usage {
        /// Description of the usage error.
        message: String,
    },

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// WebSocket connection failed.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// The peer connection task is gone.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Listening endpoint failed (bind or accept).
    #[error("Failed to listen on port {port}: {source}")]
    Listen {
        /// Port the server tried to use.
        port: u16,
        /// Underlying IO failure.
        #[source]
        source: IoError,
    },

    /// TLS material could not be loaded or the TLS config is invalid.
    #[error("TLS error: {message}")]
    Tls {
        /// Description of the TLS error.
        message: String,
    },

    // ========================================================================
    // Session Errors
    // ========================================================================
    /// The user aborted an interactive prompt.
    #[error("Interrupted")]
    Interrupted,

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a usage error.
    #[inline]
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a listen error.
    #[inline]
    pub fn listen(port: u16, source: IoError) -> Self {
        Self::Listen { port, source }
    }

    /// Creates a TLS error.
    #[inline]
    pub fn tls(message: impl Into<String>) -> Self {
        Self::Tls {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a usage error.
    #[inline]
    #[must_use]
    pub fn is_usage(&self) -> bool {
        matches!(self, Self::Usage { .. })
    }

    /// Returns `true` if the user interrupted the session.
    ///
    /// Interrupts are a normal shutdown path, not a failure.
    #[inline]
    #[must_use]
    pub fn is_interrupt(&self) -> bool {
        matches!(self, Self::Interrupted)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::ErrorKind;

    #[test]
    fn test_usage_display_is_bare_message() {
        let err = Error::usage("Invalid header: no colon");
        assert_eq!(err.to_string(), "Invalid header: no colon");
        assert!(err.is_usage());
        assert!(!err.is_interrupt());
    }

    #[test]
    fn test_listen_display() {
        let err = Error::listen(8080, IoError::new(ErrorKind::AddrInUse, "address in use"));
        assert_eq!(
            err.to_string(),
            "Failed to listen on port 8080: address in use"
        );
        assert!(!err.is_usage());
    }

    #[test]
    fn test_is_interrupt() {
        assert!(Error::Interrupted.is_interrupt());
        assert!(!Error::ConnectionClosed.is_interrupt());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = IoError::new(ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_from_ws_error() {
        let err: Error = WsError::ConnectionClosed.into();
        assert!(matches!(err, Error::WebSocket(_)));
    }
}
