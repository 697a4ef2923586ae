//! Connection session management for Parley.
//!
//! This crate handles the lifecycle of client connections around the
//! presence core:
//!
//! 1. **Open**: a new connection gets an outbox and starts `Unnamed`
//! 2. **Name**: the client claims a unique display name, once
//! 3. **Route**: named clients exchange direct messages by name
//! 4. **Close**: the name is released and everyone gets the new list
//!
//! # How it fits in the stack
//!
//! ```text
//! Server / handler (above)  ← one task per connection, calls SessionManager
//!     ↕
//! Session layer (this crate)  ← locking, lifecycle, broadcast ordering
//!     ↕
//! Presence core (below)  ← NameRegistry, PresenceBroadcaster, route
//! ```

mod error;
mod manager;
mod session;

pub use error::SessionError;
pub use manager::SessionManager;
pub use session::{SessionConfig, SessionState};
