//! Error types for the presence layer.

/// Reasons a display name cannot be registered.
///
/// None of these are fatal: the connection keeps whatever name it had
/// (possibly none) and the next presence broadcast tells the client the
/// actual state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PresenceError {
    /// The requested name was empty or only whitespace.
    #[error("display name must not be empty")]
    EmptyName,

    /// Another live connection already holds this name.
    #[error("display name {0:?} is already taken")]
    NameTaken(String),

    /// The connection already holds a different name. Names are set
    /// once per connection and never changed.
    #[error("connection is already named {current:?}, cannot become {requested:?}")]
    AlreadyNamed { current: String, requested: String },
}

impl PresenceError {
    /// HTTP-style status code used when the failure is reported back to
    /// the client.
    pub fn code(&self) -> u16 {
        match self {
            Self::EmptyName => 400,
            Self::NameTaken(_) | Self::AlreadyNamed { .. } => 409,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_distinguish_bad_input_from_conflicts() {
        assert_eq!(PresenceError::EmptyName.code(), 400);
        assert_eq!(PresenceError::NameTaken("a".into()).code(), 409);
        assert_eq!(
            PresenceError::AlreadyNamed {
                current: "a".into(),
                requested: "b".into(),
            }
            .code(),
            409
        );
    }

    #[test]
    fn test_name_taken_message_quotes_name() {
        let err = PresenceError::NameTaken("alice".into());
        assert_eq!(err.to_string(), "display name \"alice\" is already taken");
    }
}
