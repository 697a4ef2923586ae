//! Session types: per-connection state and session-wide configuration.

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Configuration for session behavior.
///
/// Sensible defaults are provided; override only the fields you need:
///
/// ```rust
/// use parley_session::SessionConfig;
///
/// let config = SessionConfig {
///     outbox_capacity: 32,
///     ..SessionConfig::default()
/// };
/// assert!(config.snapshot_on_open);
/// ```
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How many server events may wait in one connection's outbox before
    /// new events for that connection are dropped.
    ///
    /// Default: 256. Values below 1 are treated as 1.
    pub outbox_capacity: usize,

    /// Whether a newly opened connection immediately receives the current
    /// `users_list`, instead of waiting for the next registry change.
    ///
    /// Default: true.
    pub snapshot_on_open: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            outbox_capacity: 256,
            snapshot_on_open: true,
        }
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Where a connection is in its lifecycle.
///
/// ```text
///   Unnamed ──(set_name)──→ Named ──(close)──→ Closed
///      │                                         ↑
///      └─────────────────(close)─────────────────┘
/// ```
///
/// There is no way back from `Closed` and no way from `Named` back to
/// `Unnamed`: a connection names itself at most once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Open, but no display name registered yet.
    Unnamed,

    /// Open and holding this display name.
    Named(String),

    /// Not open: torn down, or never opened.
    Closed,
}

impl SessionState {
    pub fn is_open(&self) -> bool {
        !matches!(self, Self::Closed)
    }

    /// The display name, if the session holds one.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Named(name) => Some(name),
            _ => None,
        }
    }
}
