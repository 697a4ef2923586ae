/// A frame that could not be turned into an event, or the reverse.
///
/// On an inbound frame this ends the sending connection's session.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[cfg(feature = "json")]
    #[error("could not encode event: {0}")]
    Encode(serde_json::Error),

    /// Not JSON, unknown `event` name, or a payload of the wrong shape.
    #[cfg(feature = "json")]
    #[error("malformed frame: {0}")]
    Decode(serde_json::Error),

    #[error("invalid frame: {0}")]
    InvalidMessage(String),
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;

    #[test]
    fn test_decode_error_display_names_frame() {
        let err = serde_json::from_str::<u8>("x").unwrap_err();
        let msg = ProtocolError::Decode(err).to_string();
        assert!(msg.starts_with("malformed frame:"));
    }
}
