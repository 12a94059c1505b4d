//! Listening endpoint.
//!
//! Binds a TCP listener and upgrades accepted streams to WebSocket in
//! background tasks, handing finished upgrades back over a channel.
//!
//! # Connection Flow
//!
//! 1. [`Listener::bind`] binds the port
//! 2. [`Listener::accept`] yields raw TCP streams
//! 3. [`spawn_upgrade`] performs the handshake off the caller's loop
//! 4. The caller receives an [`Upgraded`] stream and decides whether to keep it

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, trace};

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Timeout for a client to finish the WebSocket handshake.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// Upgraded
// ============================================================================

/// A stream that completed the WebSocket handshake.
#[derive(Debug)]
pub struct Upgraded {
    /// The WebSocket stream.
    pub stream: WebSocketStream<TcpStream>,
    /// Remote address.
    pub addr: SocketAddr,
}

// ============================================================================
// Listener
// ============================================================================

/// A bound WebSocket listening endpoint.
#[derive(Debug)]
pub struct Listener {
    /// TCP listener for incoming connections.
    listener: TcpListener,
    /// Port the server is bound to.
    port: u16,
}

impl Listener {
    /// Binds to the specified address and port.
    ///
    /// Use port 0 to let the OS assign a port.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Listen`] if binding fails.
    pub async fn bind(ip: IpAddr, port: u16) -> Result<Self> {
        let addr = SocketAddr::new(ip, port);
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| Error::listen(port, e))?;
        let actual_port = listener
            .local_addr()
            .map_err(|e| Error::listen(port, e))?
            .port();

        debug!(port = actual_port, "WebSocket server bound");

        Ok(Self {
            listener,
            port: actual_port,
        })
    }

    /// Returns the port the server is bound to.
    #[inline]
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Returns the local socket address.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the socket is gone.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts the next TCP connection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Listen`] if the listener fails.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr)> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(|e| Error::listen(self.port, e))?;

        trace!(?addr, "TCP connection accepted");
        Ok((stream, addr))
    }
}

// ============================================================================
// Upgrade
// ============================================================================

/// Upgrades `stream` to WebSocket in a background task.
///
/// Successful upgrades are sent on `upgrades`; failed or timed-out
/// handshakes are logged and dropped.
pub fn spawn_upgrade(
    stream: TcpStream,
    addr: SocketAddr,
    upgrades: mpsc::UnboundedSender<Upgraded>,
) {
    tokio::spawn(async move {
        match timeout(HANDSHAKE_TIMEOUT, tokio_tungstenite::accept_async(stream)).await {
            Ok(Ok(stream)) => {
                debug!(?addr, "WebSocket handshake completed");
                let _ = upgrades.send(Upgraded { stream, addr });
            }
            Ok(Err(e)) => debug!(?addr, error = %e, "WebSocket upgrade failed"),
            Err(_) => debug!(?addr, "WebSocket handshake timed out"),
        }
    });
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::net::Ipv4Addr;

    #[tokio::test]
    async fn test_bind_random_port() {
        let listener = Listener::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0)
            .await
            .expect("bind should succeed");

        assert!(listener.port() > 0);
        let addr = listener.local_addr().expect("local addr");
        assert_eq!(addr.ip(), IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(addr.port(), listener.port());
    }

    #[tokio::test]
    async fn test_bind_in_use_is_listen_error() {
        let first = Listener::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0)
            .await
            .expect("bind should succeed");

        let err = Listener::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), first.port())
            .await
            .expect_err("port is taken");
        assert!(matches!(err, Error::Listen { port, .. } if port == first.port()));
    }

    #[tokio::test]
    async fn test_upgrade_hands_back_stream() {
        let listener = Listener::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0)
            .await
            .expect("bind should succeed");
        let url = format!("ws://127.0.0.1:{}", listener.port());

        let client = tokio::spawn(async move { tokio_tungstenite::connect_async(url).await });

        let (stream, addr) = listener.accept().await.expect("accept");
        let (tx, mut rx) = mpsc::unbounded_channel();
        spawn_upgrade(stream, addr, tx);

        let upgraded = rx.recv().await.expect("upgraded");
        assert_eq!(upgraded.addr, addr);
        assert!(client.await.expect("join").is_ok());
    }

    #[tokio::test]
    async fn test_failed_upgrade_is_dropped() {
        let listener = Listener::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0)
            .await
            .expect("bind should succeed");
        let addr = listener.local_addr().expect("local addr");

        // Plain TCP client that hangs up without a handshake.
        let client = tokio::spawn(async move {
            let stream = TcpStream::connect(addr).await.expect("connect");
            drop(stream);
        });

        let (stream, remote) = listener.accept().await.expect("accept");
        let (tx, mut rx) = mpsc::unbounded_channel();
        spawn_upgrade(stream, remote, tx);
        client.await.expect("join");

        assert!(rx.recv().await.is_none());
    }
}
