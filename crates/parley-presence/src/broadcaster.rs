//! Per-connection mailboxes and presence fan-out.
//!
//! Every open connection, named or not, has one mailbox drained by its
//! writer task. It has two parts:
//!
//! - a bounded queue for one-off events (direct messages, errors), filled
//!   with `try_send`: a slow client loses events, it never stalls the
//!   caller
//! - a presence slot holding only the latest snapshot; a newer snapshot
//!   replaces an unread one, so the newest view is never the one dropped

use std::collections::HashMap;

use parley_protocol::ServerEvent;
use parley_transport::ConnectionId;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};
use tokio::sync::{mpsc, watch};

use crate::{DropReason, PresenceSnapshot};

/// Creates the two ends of one connection's mailbox.
///
/// `capacity` bounds the event queue only; the presence slot always
/// holds at most one snapshot.
pub fn mailbox(capacity: usize) -> (Outbox, Mailbox) {
    let (events_tx, events_rx) = mpsc::channel(capacity.max(1));
    let (presence_tx, presence_rx) = watch::channel(None);
    (
        Outbox {
            events: events_tx,
            presence: presence_tx,
        },
        Mailbox {
            events: events_rx,
            presence: presence_rx,
            presence_open: true,
        },
    )
}

/// Sending half of a connection's mailbox, held by the broadcaster.
#[derive(Debug)]
pub struct Outbox {
    events: mpsc::Sender<ServerEvent>,
    presence: watch::Sender<Option<PresenceSnapshot>>,
}

impl Outbox {
    /// Enqueues a one-off event, dropping it if the queue is full.
    pub fn send(&self, event: ServerEvent) -> Result<(), DropReason> {
        self.events.try_send(event).map_err(|e| match e {
            TrySendError::Full(_) => DropReason::QueueFull,
            TrySendError::Closed(_) => DropReason::TargetClosed,
        })
    }

    /// Replaces the presence slot. Never blocks and never fails.
    pub fn publish(&self, snapshot: PresenceSnapshot) {
        self.presence.send_replace(Some(snapshot));
    }

    /// `true` once the receiving [`Mailbox`] is gone.
    pub fn is_closed(&self) -> bool {
        self.events.is_closed()
    }
}

/// Receiving half of a connection's mailbox, drained by its writer.
#[derive(Debug)]
pub struct Mailbox {
    events: mpsc::Receiver<ServerEvent>,
    presence: watch::Receiver<Option<PresenceSnapshot>>,
    presence_open: bool,
}

impl Mailbox {
    /// Waits for the next event to write.
    ///
    /// An unread snapshot goes out before queued events, so a snapshot
    /// published before a message is never written after it. Returns
    /// `None` once the connection is detached and everything is drained.
    pub async fn recv(&mut self) -> Option<ServerEvent> {
        loop {
            tokio::select! {
                biased;
                changed = self.presence.changed(), if self.presence_open => {
                    if changed.is_err() {
                        self.presence_open = false;
                        continue;
                    }
                    if let Some(snapshot) = self.presence.borrow_and_update().as_ref() {
                        return Some(snapshot.to_event());
                    }
                }
                event = self.events.recv() => return event,
            }
        }
    }

    /// Non-blocking [`recv`](Self::recv).
    pub fn try_recv(&mut self) -> Result<ServerEvent, TryRecvError> {
        if self.presence.has_changed().unwrap_or(false) {
            if let Some(snapshot) = self.presence.borrow_and_update().as_ref() {
                return Ok(snapshot.to_event());
            }
        }
        self.events.try_recv()
    }
}

/// Fans presence snapshots out to every open connection and delivers
/// single-target events.
#[derive(Debug, Default)]
pub struct PresenceBroadcaster {
    outboxes: HashMap<ConnectionId, Outbox>,
}

impl PresenceBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the outbox for a newly opened connection.
    ///
    /// Returns `false` and leaves the existing outbox in place if the
    /// connection is already attached.
    pub fn attach(&mut self, conn_id: ConnectionId, outbox: Outbox) -> bool {
        if self.outboxes.contains_key(&conn_id) {
            return false;
        }
        self.outboxes.insert(conn_id, outbox);
        true
    }

    /// Drops the outbox of a closing connection.
    ///
    /// Returns `true` only the first time for a given connection.
    pub fn detach(&mut self, conn_id: ConnectionId) -> bool {
        self.outboxes.remove(&conn_id).is_some()
    }

    pub fn is_attached(&self, conn_id: ConnectionId) -> bool {
        self.outboxes.contains_key(&conn_id)
    }

    /// Number of attached connections.
    pub fn len(&self) -> usize {
        self.outboxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outboxes.is_empty()
    }

    /// Publishes a snapshot to every attached connection, including the
    /// one whose action triggered it.
    ///
    /// Returns how many connections still have a live mailbox. A
    /// snapshot the client has not read yet is replaced, not queued.
    pub fn broadcast(&self, snapshot: &PresenceSnapshot) -> usize {
        let mut delivered = 0;
        for (conn_id, outbox) in &self.outboxes {
            if outbox.is_closed() {
                tracing::debug!(%conn_id, "mailbox closed, skipping");
                continue;
            }
            outbox.publish(snapshot.clone());
            delivered += 1;
        }
        tracing::debug!(
            names = snapshot.len(),
            delivered,
            connections = self.outboxes.len(),
            "presence broadcast"
        );
        delivered
    }

    /// Enqueues one event for one connection.
    pub fn send_to(
        &self,
        conn_id: ConnectionId,
        event: ServerEvent,
    ) -> Result<(), DropReason> {
        self.outboxes
            .get(&conn_id)
            .ok_or(DropReason::TargetClosed)?
            .send(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cid(id: u64) -> ConnectionId {
        ConnectionId::new(id)
    }

    fn snapshot(names: &[&str]) -> PresenceSnapshot {
        PresenceSnapshot::new(names.iter().map(|n| n.to_string()))
    }

    fn users(names: &[&str]) -> ServerEvent {
        ServerEvent::UsersList(names.iter().map(|n| n.to_string()).collect())
    }

    fn message(body: &str) -> ServerEvent {
        ServerEvent::ReceiveMessage {
            from: "alice".into(),
            message: body.into(),
        }
    }

    #[test]
    fn test_attach_twice_keeps_first_outbox() {
        let mut b = PresenceBroadcaster::new();
        let (tx1, mut rx1) = mailbox(4);
        let (tx2, mut rx2) = mailbox(4);

        assert!(b.attach(cid(1), tx1));
        assert!(!b.attach(cid(1), tx2));

        b.send_to(cid(1), message("hi")).unwrap();
        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_err());
    }

    #[test]
    fn test_detach_is_true_only_once() {
        let mut b = PresenceBroadcaster::new();
        let (tx, _rx) = mailbox(4);
        b.attach(cid(1), tx);

        assert!(b.detach(cid(1)));
        assert!(!b.detach(cid(1)));
        assert!(b.is_empty());
    }

    #[test]
    fn test_broadcast_reaches_every_attached_connection() {
        let mut b = PresenceBroadcaster::new();
        let (tx1, mut rx1) = mailbox(4);
        let (tx2, mut rx2) = mailbox(4);
        b.attach(cid(1), tx1);
        b.attach(cid(2), tx2);

        let delivered = b.broadcast(&snapshot(&["alice"]));

        assert_eq!(delivered, 2);
        assert_eq!(rx1.try_recv().unwrap(), users(&["alice"]));
        assert_eq!(rx2.try_recv().unwrap(), users(&["alice"]));
    }

    #[test]
    fn test_broadcast_skips_closed_mailbox_and_continues() {
        let mut b = PresenceBroadcaster::new();
        let (tx1, rx1) = mailbox(4);
        let (tx2, mut rx2) = mailbox(4);
        b.attach(cid(1), tx1);
        b.attach(cid(2), tx2);
        drop(rx1);

        let delivered = b.broadcast(&snapshot(&["bob"]));

        assert_eq!(delivered, 1);
        assert!(rx2.try_recv().is_ok());
    }

    #[test]
    fn test_broadcast_latest_snapshot_wins_over_unread_one() {
        let mut b = PresenceBroadcaster::new();
        let (tx, mut rx) = mailbox(1);
        b.attach(cid(1), tx);

        assert_eq!(b.broadcast(&snapshot(&["a"])), 1);
        assert_eq!(b.broadcast(&snapshot(&["a", "b"])), 1);

        assert_eq!(rx.try_recv().unwrap(), users(&["a", "b"]));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_broadcast_not_lost_behind_full_event_queue() {
        let mut b = PresenceBroadcaster::new();
        let (tx, mut rx) = mailbox(1);
        b.attach(cid(1), tx);
        b.send_to(cid(1), message("one")).unwrap();
        assert_eq!(
            b.send_to(cid(1), message("two")),
            Err(DropReason::QueueFull)
        );

        b.broadcast(&snapshot(&["alice", "bob"]));

        assert_eq!(rx.try_recv().unwrap(), users(&["alice", "bob"]));
        assert_eq!(rx.try_recv().unwrap(), message("one"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_send_to_unknown_connection_is_target_closed() {
        let b = PresenceBroadcaster::new();
        let result = b.send_to(cid(7), message("hi"));
        assert_eq!(result, Err(DropReason::TargetClosed));
    }

    #[tokio::test]
    async fn test_mailbox_recv_writes_snapshot_before_later_message() {
        let (tx, mut rx) = mailbox(4);
        tx.publish(snapshot(&["alice", "bob"]));
        tx.send(message("hi")).unwrap();

        assert_eq!(rx.recv().await, Some(users(&["alice", "bob"])));
        assert_eq!(rx.recv().await, Some(message("hi")));
    }

    #[tokio::test]
    async fn test_mailbox_recv_drains_then_ends_after_detach() {
        let (tx, mut rx) = mailbox(4);
        tx.send(message("last")).unwrap();
        tx.publish(snapshot(&["alice"]));
        drop(tx);

        assert_eq!(rx.recv().await, Some(users(&["alice"])));
        assert_eq!(rx.recv().await, Some(message("last")));
        assert_eq!(rx.recv().await, None);
    }
}
