//! Wire events exchanged between relay clients and the server.
//!
//! Every frame on the wire carries exactly one event, encoded as an
//! adjacently tagged JSON object:
//!
//! ```text
//! { "event": "set_username",    "data": "alice" }
//! { "event": "private_message", "data": { "to": "bob", "message": "hi" } }
//! { "event": "users_list",      "data": ["alice", "bob"] }
//! { "event": "receive_message", "data": { "from": "alice", "message": "hi" } }
//! ```
//!
//! Event names are snake_case so browser clients can dispatch on them
//! exactly like named socket events.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Client → Server
// ---------------------------------------------------------------------------

/// Events a client may send to the relay.
///
/// `#[serde(tag = "event", content = "data")]` keeps the event name and
/// its payload side by side, so a bare string payload (`set_username`)
/// and an object payload (`private_message`) share one envelope shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Claim a display name for this connection.
    ///
    /// There is no acknowledgment by default; the client learns the
    /// outcome from the next `users_list` broadcast.
    SetUsername(String),

    /// Send a direct message to the connection holding `to`.
    PrivateMessage { to: String, message: String },
}

impl ClientEvent {
    /// Returns the wire name of this event, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetUsername(_) => "set_username",
            Self::PrivateMessage { .. } => "private_message",
        }
    }
}

// ---------------------------------------------------------------------------
// Server → Client
// ---------------------------------------------------------------------------

/// Events the relay pushes to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Full replacement list of every registered display name.
    ///
    /// Sent to every open connection after each registry mutation.
    /// Clients replace their whole list; nothing is incremental.
    UsersList(Vec<String>),

    /// A direct message routed to this connection.
    ReceiveMessage { from: String, message: String },

    /// Optional failure notice for the client's last request.
    ///
    /// Only emitted when the server runs with error notifications
    /// enabled. `code` follows HTTP conventions (400 bad request,
    /// 403 forbidden, 404 not found, 409 conflict).
    Error { code: u16, message: String },
}

impl ServerEvent {
    /// Returns the wire name of this event, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::UsersList(_) => "users_list",
            Self::ReceiveMessage { .. } => "receive_message",
            Self::Error { .. } => "error",
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
