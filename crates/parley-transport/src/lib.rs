//! Connection layer for Parley.
//!
//! Everything above this crate sees a client as a [`ConnectionId`] plus a
//! pair of byte pipes. Frames go out through [`Connection::send`] and come
//! in through [`Connection::recv`]; the [`Transport`] hands out new
//! connections as clients arrive.
//!
//! # Feature Flags
//!
//! - `websocket` (default): [`WebSocketTransport`] over `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{
    DEFAULT_HANDSHAKE_TIMEOUT, PendingWebSocket, WebSocketConnection,
    WebSocketTransport,
};

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one live client connection.
///
/// Ids come from a process-wide counter, so a closed connection's id is
/// never handed to a later one. They sort in accept order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Wraps a raw id. Transports should use [`ConnectionId::next`].
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Allocates a fresh, never-used id.
    pub fn next() -> Self {
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Source of incoming client connections.
pub trait Transport: Send + Sync + 'static {
    type Connection: Connection;
    type Handshake: Handshake<Connection = Self::Connection, Error = Self::Error>;
    type Error: std::error::Error + Send + Sync;

    /// Waits for the next client to connect.
    ///
    /// Returns as soon as the client is there; the protocol handshake is
    /// left to [`Handshake::complete`] so a slow client cannot hold up
    /// the accept loop.
    async fn accept(&mut self) -> Result<Self::Handshake, Self::Error>;

    /// Stops handing out new connections. Open ones are unaffected.
    async fn shutdown(&self) -> Result<(), Self::Error>;
}

/// A client that has connected but not yet finished its handshake.
pub trait Handshake: Send + 'static {
    type Connection: Connection;
    type Error: std::error::Error + Send + Sync;

    /// Runs the handshake, bounded by the transport's timeout.
    async fn complete(self) -> Result<Self::Connection, Self::Error>;
}

/// One client's bidirectional frame channel.
///
/// `send` and `recv` may run at the same time from different tasks; a
/// writer must never wait on a reader parked in `recv`.
pub trait Connection: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync;

    /// Writes one frame.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// Reads the next data frame, or `Ok(None)` once the peer has closed.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Starts the closing handshake.
    async fn close(&self) -> Result<(), Self::Error>;

    fn id(&self) -> ConnectionId;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_display_prefixed() {
        assert_eq!(ConnectionId::new(7).to_string(), "conn-7");
        assert_eq!(ConnectionId::new(7).as_u64(), 7);
    }

    #[test]
    fn test_next_never_repeats() {
        let a = ConnectionId::next();
        let b = ConnectionId::next();
        let c = ConnectionId::next();
        assert!(a < b && b < c);
    }

    #[test]
    fn test_next_unique_across_threads() {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                std::thread::spawn(|| {
                    (0..100).map(|_| ConnectionId::next()).collect::<Vec<_>>()
                })
            })
            .collect();

        let mut ids: Vec<ConnectionId> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        let total = ids.len();
        ids.sort();
        ids.dedup();

        assert_eq!(ids.len(), total);
    }
}
