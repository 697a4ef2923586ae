//! Unified error type for the Parley relay.

use parley_protocol::ProtocolError;
use parley_session::SessionError;
use parley_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// `#[from]` on each variant lets `?` convert sub-crate errors
/// automatically. A `ParleyError` from a connection task ends that one
/// connection; it never reaches the accept loop.
#[derive(Debug, thiserror::Error)]
pub enum ParleyError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid frame).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (no open session, duplicate open).
    #[error(transparent)]
    Session(#[from] SessionError),
}

#[cfg(test)]
mod tests {
    use parley_presence::PresenceError;
    use parley_transport::ConnectionId;

    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err: ParleyError = TransportError::Shutdown.into();
        assert!(matches!(err, ParleyError::Transport(_)));
        assert_eq!(err.to_string(), "transport shut down");
    }

    #[test]
    fn test_from_protocol_error() {
        let err: ParleyError =
            ProtocolError::InvalidMessage("empty frame".into()).into();
        assert!(matches!(err, ParleyError::Protocol(_)));
        assert!(err.to_string().contains("empty frame"));
    }

    #[test]
    fn test_from_session_error() {
        let err: ParleyError =
            SessionError::NotConnected(ConnectionId::new(3)).into();
        assert!(matches!(err, ParleyError::Session(_)));
        assert!(err.to_string().contains("conn-3"));
    }

    #[test]
    fn test_presence_error_message_passes_through() {
        let err: ParleyError =
            SessionError::from(PresenceError::NameTaken("alice".into())).into();
        assert!(err.to_string().contains("alice"));
    }
}
