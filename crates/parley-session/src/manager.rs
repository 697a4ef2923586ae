//! The session manager: connection lifecycle around the presence core.
//!
//! Owns the one [`NameRegistry`] and the one [`PresenceBroadcaster`] of
//! the server and is shared by every connection task through an `Arc`.
//!
//! # Locking
//!
//! Both structures sit behind their own `RwLock`, always acquired in the
//! order registry → broadcaster. Registry mutations take the write side
//! and enqueue their presence broadcast before releasing it, so every
//! outbox sees snapshots in the order the mutations happened. Routing
//! only takes read locks and runs concurrently with other routing.

use parley_presence::{
    Delivery, Mailbox, NameRegistry, PresenceBroadcaster, PresenceSnapshot,
    Registration, mailbox, route,
};
use parley_protocol::ServerEvent;
use parley_transport::ConnectionId;
use tokio::sync::RwLock;

use crate::{SessionConfig, SessionError, SessionState};

/// Tracks every open connection and its display name.
///
/// ## Lifecycle
///
/// ```text
/// open() ──→ set_name() ──→ send_private()* ──→ close()
///   │            │                                 │
///   ▼            ▼                                 ▼
/// [Unnamed]   [Named] + broadcast            [Closed] + broadcast
/// ```
pub struct SessionManager {
    registry: RwLock<NameRegistry>,
    broadcaster: RwLock<PresenceBroadcaster>,
    config: SessionConfig,
}

impl SessionManager {
    /// Creates a manager with no open sessions.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            registry: RwLock::new(NameRegistry::new()),
            broadcaster: RwLock::new(PresenceBroadcaster::new()),
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Opens a session for a freshly accepted connection.
    ///
    /// Returns the connection's [`Mailbox`]; the caller drains it into
    /// the socket.
    ///
    /// # Errors
    /// Returns [`SessionError::AlreadyOpen`] if `conn_id` is already open.
    pub async fn open(
        &self,
        conn_id: ConnectionId,
    ) -> Result<Mailbox, SessionError> {
        let (outbox, inbox) = mailbox(self.config.outbox_capacity);

        // Read lock: the initial snapshot must not interleave with a
        // mutation's broadcast.
        let registry = self.registry.read().await;
        let mut outboxes = self.broadcaster.write().await;

        if self.config.snapshot_on_open {
            // Goes into the presence slot, which has no capacity limit
            // and whose receiver is still in our hands.
            outbox.publish(registry.snapshot());
        }
        if !outboxes.attach(conn_id, outbox) {
            return Err(SessionError::AlreadyOpen(conn_id));
        }

        tracing::info!(
            %conn_id, connections = outboxes.len(), "session opened"
        );
        Ok(inbox)
    }

    /// Claims a display name for the connection.
    ///
    /// Surrounding whitespace is trimmed. Every attempt on an open
    /// session is followed by exactly one presence broadcast, including
    /// idempotent and rejected attempts, so clients always converge on
    /// the server's view.
    ///
    /// # Errors
    /// - [`SessionError::NotConnected`]: no open session (no broadcast)
    /// - [`SessionError::Presence`]: the registry rejected the name
    pub async fn set_name(
        &self,
        conn_id: ConnectionId,
        name: &str,
    ) -> Result<Registration, SessionError> {
        let name = name.trim();

        let mut registry = self.registry.write().await;
        let outboxes = self.broadcaster.read().await;

        if !outboxes.is_attached(conn_id) {
            return Err(SessionError::NotConnected(conn_id));
        }

        let result = registry.register(name, conn_id);
        outboxes.broadcast(&registry.snapshot());

        if let Err(e) = &result {
            tracing::debug!(%conn_id, name, error = %e, "set_name rejected");
        }
        result.map_err(SessionError::from)
    }

    /// Routes a direct message from `conn_id` to whoever holds `to`.
    ///
    /// Unresolvable targets and unnamed senders are not errors; they come
    /// back as [`Delivery::Dropped`].
    ///
    /// # Errors
    /// Returns [`SessionError::NotConnected`] if the sender has no open
    /// session.
    pub async fn send_private(
        &self,
        conn_id: ConnectionId,
        to: &str,
        body: String,
    ) -> Result<Delivery, SessionError> {
        let registry = self.registry.read().await;
        let outboxes = self.broadcaster.read().await;

        if !outboxes.is_attached(conn_id) {
            return Err(SessionError::NotConnected(conn_id));
        }
        Ok(route(&registry, &outboxes, conn_id, to, body))
    }

    /// Enqueues an event for a single open connection.
    ///
    /// Used for optional acknowledgments; returns `false` if the event
    /// was dropped.
    pub async fn notify(&self, conn_id: ConnectionId, event: ServerEvent) -> bool {
        self.broadcaster.read().await.send_to(conn_id, event).is_ok()
    }

    /// Tears down a connection's session.
    ///
    /// Releases its name (if any), drops its outbox, and broadcasts the
    /// new presence list once. Safe to call from every path that notices
    /// the connection is gone: only the first call does anything and
    /// returns `true`.
    pub async fn close(&self, conn_id: ConnectionId) -> bool {
        let mut registry = self.registry.write().await;
        let mut outboxes = self.broadcaster.write().await;

        if !outboxes.detach(conn_id) {
            return false;
        }
        let released = registry.unregister_by_connection(conn_id);
        outboxes.broadcast(&registry.snapshot());

        tracing::info!(
            %conn_id,
            released,
            connections = outboxes.len(),
            "session closed"
        );
        true
    }

    /// Returns the lifecycle state of a connection.
    pub async fn state(&self, conn_id: ConnectionId) -> SessionState {
        let registry = self.registry.read().await;
        let outboxes = self.broadcaster.read().await;

        if !outboxes.is_attached(conn_id) {
            return SessionState::Closed;
        }
        match registry.name_of(conn_id) {
            Some(name) => SessionState::Named(name.to_string()),
            None => SessionState::Unnamed,
        }
    }

    /// Returns the current presence list.
    pub async fn snapshot(&self) -> PresenceSnapshot {
        self.registry.read().await.snapshot()
    }

    /// Resolves a display name to its connection.
    pub async fn lookup(&self, name: &str) -> Option<ConnectionId> {
        self.registry.read().await.lookup(name)
    }

    /// Number of open sessions, named or not.
    pub async fn connection_count(&self) -> usize {
        self.broadcaster.read().await.len()
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

// =========================================================================
// Tests
// =========================================================================
