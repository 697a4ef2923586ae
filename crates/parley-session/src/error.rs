//! Error types for the session layer.

use parley_presence::PresenceError;
use parley_transport::ConnectionId;

/// Errors that can occur while driving a connection's session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The registry rejected a name.
    #[error(transparent)]
    Presence(#[from] PresenceError),

    /// The connection has no open session (closed, or never opened).
    #[error("no open session for {0}")]
    NotConnected(ConnectionId),

    /// A session for this connection is already open.
    #[error("session for {0} is already open")]
    AlreadyOpen(ConnectionId),
}
