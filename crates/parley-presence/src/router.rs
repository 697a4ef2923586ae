//! Point-to-point routing of direct messages by display name.
//!
//! Delivery is best-effort and at-most-once: anything that cannot be
//! resolved or enqueued right now is dropped and reported only through
//! the returned [`Delivery`], never as an error to the sender.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use parley_protocol::ServerEvent;
use parley_transport::ConnectionId;

use crate::{NameRegistry, PresenceBroadcaster};

/// A direct message in flight. Never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutedMessage {
    /// Display name of the sender.
    pub from: String,
    /// Display name the sender addressed.
    pub to: String,
    pub body: String,
    /// Milliseconds since the Unix epoch when the message was routed.
    pub timestamp: u64,
}

impl RoutedMessage {
    /// The `receive_message` event handed to the target connection.
    pub fn to_event(&self) -> ServerEvent {
        ServerEvent::ReceiveMessage {
            from: self.from.clone(),
            message: self.body.clone(),
        }
    }
}

/// Why a message was not delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The sending connection has not registered a name yet.
    UnnamedSender,
    /// No live connection holds the target name.
    TargetUnresolved,
    /// The target's outbox is at capacity.
    QueueFull,
    /// The target's outbox is gone (connection closing).
    TargetClosed,
}

impl DropReason {
    /// HTTP-style status code used when the drop is reported back to the
    /// sender.
    pub fn code(&self) -> u16 {
        match self {
            Self::UnnamedSender => 403,
            Self::TargetUnresolved | Self::TargetClosed => 404,
            Self::QueueFull => 503,
        }
    }
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::UnnamedSender => "sender has no display name",
            Self::TargetUnresolved => "no user with that name",
            Self::QueueFull => "recipient is not keeping up",
            Self::TargetClosed => "recipient disconnected",
        };
        f.write_str(reason)
    }
}

/// Result of a [`route`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// The message was enqueued on the target's outbox.
    Delivered(RoutedMessage),
    /// The message was silently dropped.
    Dropped(DropReason),
}

impl Delivery {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered(_))
    }
}

/// Routes `body` from `sender` to whoever holds `target`.
///
/// Resolves the sender's own name first, then the target. Returns as
/// soon as the message is enqueued; it never waits on the recipient.
/// Messages from one sender reach a given target in the order they were
/// routed.
pub fn route(
    registry: &NameRegistry,
    outboxes: &PresenceBroadcaster,
    sender: ConnectionId,
    target: &str,
    body: String,
) -> Delivery {
    let Some(from) = registry.name_of(sender) else {
        tracing::debug!(%sender, to = target, "unnamed sender, dropping");
        return Delivery::Dropped(DropReason::UnnamedSender);
    };

    let Some(target_id) = registry.lookup(target) else {
        tracing::debug!(%sender, from, to = target, "unknown target, dropping");
        return Delivery::Dropped(DropReason::TargetUnresolved);
    };

    let msg = RoutedMessage {
        from: from.to_string(),
        to: target.to_string(),
        body,
        timestamp: now_millis(),
    };

    match outboxes.send_to(target_id, msg.to_event()) {
        Ok(()) => {
            tracing::debug!(
                %sender, %target_id, from, to = target, "message routed"
            );
            Delivery::Delivered(msg)
        }
        Err(reason) => {
            tracing::warn!(
                %sender, %target_id, to = target, %reason, "message dropped"
            );
            Delivery::Dropped(reason)
        }
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
