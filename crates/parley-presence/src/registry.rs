//! The name registry: which connection owns which display name.
//!
//! # Concurrency note
//!
//! `NameRegistry` is a plain pair of `HashMap`s and is NOT thread-safe by
//! itself. The session layer owns exactly one instance behind a single
//! `RwLock`, so every `register`/`unregister_by_connection` is mutually
//! exclusive with every other registry call while lookups share the read
//! side.

use std::collections::HashMap;

use parley_protocol::ServerEvent;
use parley_transport::ConnectionId;

use crate::PresenceError;

/// Outcome of a successful [`NameRegistry::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// A new entry was inserted.
    Created,
    /// The connection already held this exact name; nothing changed.
    Unchanged,
}

/// A point-in-time list of every registered display name.
///
/// Names are kept sorted so two snapshots of the same set compare and
/// serialize identically.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresenceSnapshot {
    names: Vec<String>,
}

impl PresenceSnapshot {
    /// Builds a snapshot from any collection of names.
    pub fn new(names: impl IntoIterator<Item = String>) -> Self {
        let mut names: Vec<String> = names.into_iter().collect();
        names.sort_unstable();
        Self { names }
    }

    /// The registered names, sorted.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.binary_search_by(|n| n.as_str().cmp(name)).is_ok()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// The `users_list` event carrying this snapshot.
    pub fn to_event(&self) -> ServerEvent {
        ServerEvent::UsersList(self.names.clone())
    }
}

/// Authoritative mapping from display name to owning connection.
#[derive(Debug, Default)]
pub struct NameRegistry {
    /// Display name → owning connection. Unique by construction.
    names: HashMap<String, ConnectionId>,

    /// Reverse index: connection → the name it holds.
    ///
    /// Lets teardown and sender resolution avoid scanning `names`.
    /// Kept in sync with `names` by every mutation.
    owners: HashMap<ConnectionId, String>,
}

impl NameRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `name` for `conn_id`.
    ///
    /// # Errors
    /// - [`PresenceError::EmptyName`]: `name` is empty or whitespace
    /// - [`PresenceError::AlreadyNamed`]: `conn_id` holds a different name
    /// - [`PresenceError::NameTaken`]: another connection holds `name`
    pub fn register(
        &mut self,
        name: &str,
        conn_id: ConnectionId,
    ) -> Result<Registration, PresenceError> {
        if name.trim().is_empty() {
            return Err(PresenceError::EmptyName);
        }

        if let Some(current) = self.owners.get(&conn_id) {
            if current == name {
                return Ok(Registration::Unchanged);
            }
            return Err(PresenceError::AlreadyNamed {
                current: current.clone(),
                requested: name.to_string(),
            });
        }

        // conn_id holds no name, so any existing owner is someone else.
        if let Some(owner) = self.names.get(name) {
            tracing::debug!(%conn_id, %owner, name, "name already taken");
            return Err(PresenceError::NameTaken(name.to_string()));
        }

        self.names.insert(name.to_string(), conn_id);
        self.owners.insert(conn_id, name.to_string());
        tracing::info!(%conn_id, name, "name registered");
        Ok(Registration::Created)
    }

    /// Removes whatever name `conn_id` holds.
    ///
    /// Returns `true` if an entry was removed. Calling it again for the
    /// same connection is a no-op returning `false`.
    pub fn unregister_by_connection(&mut self, conn_id: ConnectionId) -> bool {
        match self.owners.remove(&conn_id) {
            Some(name) => {
                self.names.remove(&name);
                tracing::info!(%conn_id, %name, "name released");
                true
            }
            None => false,
        }
    }

    /// Resolves a display name to its owning connection.
    pub fn lookup(&self, name: &str) -> Option<ConnectionId> {
        self.names.get(name).copied()
    }

    /// Resolves a connection to the name it holds, if any.
    pub fn name_of(&self, conn_id: ConnectionId) -> Option<&str> {
        self.owners.get(&conn_id).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    /// Returns every registered name.
    pub fn snapshot(&self) -> PresenceSnapshot {
        PresenceSnapshot::new(self.names.keys().cloned())
    }

    /// Number of registered names.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

// =========================================================================
// Tests
// =========================================================================
