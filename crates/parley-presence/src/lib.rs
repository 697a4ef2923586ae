//! Presence and routing core for Parley.
//!
//! Three pieces, all synchronous and in-memory:
//!
//! - [`NameRegistry`]: the single authoritative display name → connection
//!   mapping, with uniqueness enforced on insert
//! - [`PresenceBroadcaster`]: per-connection mailboxes plus the full
//!   snapshot fan-out sent after every registry mutation
//! - [`route`]: resolves a target name and enqueues a direct message
//!
//! None of these types lock internally. The session layer decides how
//! they are shared between connection tasks.

mod broadcaster;
mod error;
mod registry;
pub mod router;

pub use broadcaster::{Mailbox, Outbox, PresenceBroadcaster, mailbox};
pub use error::PresenceError;
pub use registry::{NameRegistry, PresenceSnapshot, Registration};
pub use router::{Delivery, DropReason, RoutedMessage, route};
