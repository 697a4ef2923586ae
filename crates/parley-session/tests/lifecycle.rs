//! Lifecycle scenarios driven through the public `SessionManager` API,
//! including concurrent connect/name/disconnect from many tasks.

use std::sync::Arc;

use parley_presence::{Delivery, DropReason, Mailbox, PresenceError, Registration};
use parley_protocol::ServerEvent;
use parley_session::{SessionConfig, SessionError, SessionManager, SessionState};
use parley_transport::ConnectionId;

fn cid(id: u64) -> ConnectionId {
    ConnectionId::new(id)
}

fn manager() -> Arc<SessionManager> {
    Arc::new(SessionManager::new(SessionConfig {
        snapshot_on_open: false,
        ..SessionConfig::default()
    }))
}

/// Drains everything queued and returns the last `users_list`, if any.
fn last_users_list(rx: &mut Mailbox) -> Option<Vec<String>> {
    let mut last = None;
    while let Ok(event) = rx.try_recv() {
        if let ServerEvent::UsersList(names) = event {
            last = Some(names);
        }
    }
    last
}

#[tokio::test]
async fn test_scenario_two_users_exchange_a_message() {
    let mgr = manager();
    let mut rx_a = mgr.open(cid(1)).await.unwrap();
    let mut rx_b = mgr.open(cid(2)).await.unwrap();

    mgr.set_name(cid(1), "alice").await.unwrap();
    mgr.set_name(cid(2), "bob").await.unwrap();

    assert_eq!(last_users_list(&mut rx_a).unwrap(), ["alice", "bob"]);
    assert_eq!(last_users_list(&mut rx_b).unwrap(), ["alice", "bob"]);

    let delivery = mgr.send_private(cid(1), "bob", "hi".into()).await.unwrap();
    assert!(delivery.is_delivered());

    assert_eq!(
        rx_b.try_recv().unwrap(),
        ServerEvent::ReceiveMessage {
            from: "alice".into(),
            message: "hi".into(),
        }
    );
    assert!(rx_a.try_recv().is_err(), "alice receives nothing back");
}

#[tokio::test]
async fn test_scenario_duplicate_name_is_rejected() {
    let mgr = manager();
    let _rx_a = mgr.open(cid(1)).await.unwrap();
    let _rx_b = mgr.open(cid(2)).await.unwrap();

    mgr.set_name(cid(1), "alice").await.unwrap();
    let result = mgr.set_name(cid(2), "alice").await;

    assert!(matches!(
        result,
        Err(SessionError::Presence(PresenceError::NameTaken(ref n))) if n == "alice"
    ));
    assert_eq!(mgr.lookup("alice").await, Some(cid(1)));
    assert_eq!(mgr.snapshot().await.names(), ["alice"]);
}

#[tokio::test]
async fn test_scenario_name_is_reusable_after_disconnect() {
    let mgr = manager();
    let _rx_a = mgr.open(cid(1)).await.unwrap();
    mgr.set_name(cid(1), "alice").await.unwrap();

    assert!(mgr.close(cid(1)).await);
    assert!(!mgr.snapshot().await.contains("alice"));

    let _rx_c = mgr.open(cid(3)).await.unwrap();
    assert_eq!(
        mgr.set_name(cid(3), "alice").await.unwrap(),
        Registration::Created
    );
    assert_eq!(mgr.state(cid(3)).await, SessionState::Named("alice".into()));
}

#[tokio::test]
async fn test_message_to_departed_user_is_dropped() {
    let mgr = manager();
    let _rx_a = mgr.open(cid(1)).await.unwrap();
    let _rx_b = mgr.open(cid(2)).await.unwrap();
    mgr.set_name(cid(1), "alice").await.unwrap();
    mgr.set_name(cid(2), "bob").await.unwrap();
    mgr.close(cid(2)).await;

    let delivery = mgr.send_private(cid(1), "bob", "still there?".into()).await;

    assert_eq!(
        delivery.unwrap(),
        Delivery::Dropped(DropReason::TargetUnresolved)
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_claims_for_one_name_have_one_winner() {
    let mgr = manager();
    let mut receivers = Vec::new();
    for i in 1..=32 {
        receivers.push(mgr.open(cid(i)).await.unwrap());
    }

    let mut tasks = Vec::new();
    for i in 1..=32 {
        let mgr = Arc::clone(&mgr);
        tasks.push(tokio::spawn(async move {
            mgr.set_name(cid(i), "highlander").await.is_ok()
        }));
    }

    let mut winners = 0;
    for task in tasks {
        if task.await.unwrap() {
            winners += 1;
        }
    }

    assert_eq!(winners, 1);
    assert_eq!(mgr.snapshot().await.names(), ["highlander"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_churn_leaves_consistent_presence() {
    let mgr = manager();

    // Even ids stay, odd ids leave again.
    let mut tasks = Vec::new();
    for i in 1..=40u64 {
        let mgr = Arc::clone(&mgr);
        tasks.push(tokio::spawn(async move {
            let rx = mgr.open(cid(i)).await.unwrap();
            mgr.set_name(cid(i), &format!("user{i}")).await.unwrap();
            if i % 2 == 1 {
                assert!(mgr.close(cid(i)).await);
                None
            } else {
                Some((i, rx))
            }
        }));
    }

    let mut survivors = Vec::new();
    for task in tasks {
        if let Some(entry) = task.await.unwrap() {
            survivors.push(entry);
        }
    }

    let snapshot = mgr.snapshot().await;
    let mut expected: Vec<String> =
        (1..=40u64).filter(|i| i % 2 == 0).map(|i| format!("user{i}")).collect();
    expected.sort();
    assert_eq!(snapshot.names(), expected.as_slice());
    assert_eq!(mgr.connection_count().await, 20);

    // Broadcasts are published in mutation order, so each survivor's
    // latest list is the final state.
    for (_, mut rx) in survivors {
        assert_eq!(last_users_list(&mut rx).unwrap(), expected);
    }
}

#[tokio::test]
async fn test_racing_close_paths_tear_down_once() {
    let mgr = manager();
    let _rx_a = mgr.open(cid(1)).await.unwrap();
    let mut rx_b = mgr.open(cid(2)).await.unwrap();
    mgr.set_name(cid(1), "alice").await.unwrap();
    let _ = last_users_list(&mut rx_b);

    let closes: Vec<_> = (0..8)
        .map(|_| {
            let mgr = Arc::clone(&mgr);
            tokio::spawn(async move { mgr.close(cid(1)).await })
        })
        .collect();

    let mut torn_down = 0;
    for close in closes {
        if close.await.unwrap() {
            torn_down += 1;
        }
    }

    assert_eq!(torn_down, 1);
    let mut broadcasts = 0;
    while rx_b.try_recv().is_ok() {
        broadcasts += 1;
    }
    assert_eq!(broadcasts, 1);
}
