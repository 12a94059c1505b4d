//! WebSocket transport layer.
//!
//! Wraps `tokio-tungstenite` streams so the bridges only ever see events
//! and commands, never frames.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐   PeerNotice (mpsc)   ┌─────────────────┐
//! │  Bridge loop    │◄──────────────────────│  Peer task      │◄──── WebSocket
//! │  (single        │                       │  (one per       │
//! │   consumer)     │──────────────────────►│   connection)   │────► peer
//! └─────────────────┘   PeerCommand (mpsc)  └─────────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | Peer handle and its event loop |
//! | `server` | Listening endpoint and background upgrades |
//! | `tls` | Client TLS material and connector |

// ============================================================================
// Submodules
// ============================================================================

/// Peer handle and event loop.
pub mod connection;

/// Listening endpoint.
pub mod server;

/// Client TLS material.
pub mod tls;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{Peer, PeerEvent, PeerId, PeerNotice};
pub use server::{Listener, Upgraded, spawn_upgrade};
pub use tls::TlsMaterial;
