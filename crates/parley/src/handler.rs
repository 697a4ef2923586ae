//! Per-connection handler: session open, event dispatch, teardown.
//!
//! Each accepted client gets its own Tokio task running [`serve`], plus
//! a writer task draining the session's mailbox into the socket. The
//! flow is:
//!   0. Finish the WebSocket handshake (bounded by a timeout)
//!   1. Open a session → connection is `Unnamed`
//!   2. Loop: receive frames → decode → `set_username` / `private_message`
//!   3. On clean close, transport error, or malformed frame → close the
//!      session (releases the name and broadcasts presence once)

use std::sync::Arc;
use std::time::Duration;

use parley_presence::{Delivery, Mailbox};
use parley_protocol::{ClientEvent, Codec, ServerEvent};
use parley_session::SessionError;
use parley_transport::{
    Connection, ConnectionId, Handshake, PendingWebSocket, WebSocketConnection,
};
use tokio::task::JoinHandle;

use crate::ParleyError;
use crate::server::ServerState;

/// How long a closing connection may take to flush its queued events.
const FLUSH_GRACE: Duration = Duration::from_secs(1);

/// Drop guard that closes the session when the handler exits.
///
/// Covers unwinding paths the explicit close below never reaches. Since
/// `Drop` is synchronous, the async close runs in a spawned task; the
/// session manager makes the second close a no-op.
struct SessionGuard<C: Codec> {
    conn_id: ConnectionId,
    state: Arc<ServerState<C>>,
}

impl<C: Codec> Drop for SessionGuard<C> {
    fn drop(&mut self) {
        let conn_id = self.conn_id;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            state.sessions.close(conn_id).await;
        });
    }
}

/// Upgrades a freshly accepted client, then runs its session.
pub(crate) async fn serve<C: Codec>(
    pending: PendingWebSocket,
    state: Arc<ServerState<C>>,
) {
    let peer = pending.peer_addr();
    let conn = match pending.complete().await {
        Ok(conn) => conn,
        Err(e) => {
            tracing::debug!(%peer, error = %e, "websocket handshake failed");
            return;
        }
    };

    if let Err(e) = handle_connection(conn, state).await {
        tracing::debug!(error = %e, "connection ended with error");
    }
}

/// Handles a single connection from open to close.
async fn handle_connection<C: Codec>(
    conn: WebSocketConnection,
    state: Arc<ServerState<C>>,
) -> Result<(), ParleyError> {
    let conn_id = conn.id();
    tracing::debug!(%conn_id, peer = %conn.peer_addr(), "handling new connection");

    let mailbox = state.sessions.open(conn_id).await?;
    let _guard = SessionGuard {
        conn_id,
        state: Arc::clone(&state),
    };

    let conn = Arc::new(conn);
    let mut writer =
        tokio::spawn(write_loop(Arc::clone(&conn), mailbox, Arc::clone(&state)));

    let result = read_loop(&conn, &state).await;

    // Detaching the outbox ends the writer once the mailbox drains.
    state.sessions.close(conn_id).await;
    let socket_alive = !matches!(result, Err(ParleyError::Transport(_)));
    finish_writer(conn_id, &mut writer, socket_alive).await;
    if socket_alive {
        if let Err(e) = conn.close().await {
            tracing::trace!(%conn_id, error = %e, "close handshake failed");
        }
    }

    result
}

/// Receives frames until the client leaves or misbehaves.
async fn read_loop<C: Codec>(
    conn: &WebSocketConnection,
    state: &Arc<ServerState<C>>,
) -> Result<(), ParleyError> {
    let conn_id = conn.id();

    loop {
        let data = match conn.recv().await {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::info!(%conn_id, "connection closed cleanly");
                return Ok(());
            }
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "recv error");
                return Err(e.into());
            }
        };

        let event: ClientEvent = match state.codec.decode(&data) {
            Ok(event) => event,
            Err(e) => {
                tracing::debug!(
                    %conn_id, error = %e, "malformed frame, closing session"
                );
                acknowledge(state, conn_id, 400, &e.to_string()).await;
                return Err(e.into());
            }
        };

        tracing::trace!(%conn_id, event = event.name(), "client event");
        handle_event(state, conn_id, event).await?;
    }
}

/// Dispatches one decoded client event to the session manager.
async fn handle_event<C: Codec>(
    state: &Arc<ServerState<C>>,
    conn_id: ConnectionId,
    event: ClientEvent,
) -> Result<(), ParleyError> {
    match event {
        ClientEvent::SetUsername(name) => {
            match state.sessions.set_name(conn_id, &name).await {
                Ok(_) => {}
                Err(SessionError::Presence(e)) => {
                    acknowledge(state, conn_id, e.code(), &e.to_string())
                        .await;
                }
                Err(e) => return Err(e.into()),
            }
        }

        ClientEvent::PrivateMessage { to, message } => {
            let delivery =
                state.sessions.send_private(conn_id, &to, message).await?;
            if let Delivery::Dropped(reason) = delivery {
                acknowledge(state, conn_id, reason.code(), &reason.to_string())
                    .await;
            }
        }
    }

    Ok(())
}

/// Sends an `error` event back to the client, if acknowledgments are on.
async fn acknowledge<C: Codec>(
    state: &Arc<ServerState<C>>,
    conn_id: ConnectionId,
    code: u16,
    message: &str,
) {
    if !state.notify_errors {
        return;
    }
    let event = ServerEvent::Error {
        code,
        message: message.to_string(),
    };
    if !state.sessions.notify(conn_id, event).await {
        tracing::debug!(%conn_id, code, "acknowledgment dropped");
    }
}

/// Drains the mailbox into the socket until the session closes.
async fn write_loop<C: Codec>(
    conn: Arc<WebSocketConnection>,
    mut mailbox: Mailbox,
    state: Arc<ServerState<C>>,
) {
    let conn_id = conn.id();

    while let Some(event) = mailbox.recv().await {
        let bytes = match state.codec.encode(&event) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(%conn_id, error = %e, "failed to encode event");
                continue;
            }
        };
        if let Err(e) = conn.send(&bytes).await {
            tracing::debug!(%conn_id, error = %e, "send failed, writer stopping");
            break;
        }
    }
}

/// Lets the writer flush what is already queued, then stops it.
///
/// After a transport error the socket is gone, so there is nothing to
/// flush.
async fn finish_writer(
    conn_id: ConnectionId,
    writer: &mut JoinHandle<()>,
    flush: bool,
) {
    if flush && tokio::time::timeout(FLUSH_GRACE, &mut *writer).await.is_ok() {
        return;
    }
    writer.abort();
    tracing::debug!(%conn_id, "writer stopped");
}
