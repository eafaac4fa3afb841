//! Error types for the relay
//!
//! Split by who handles them:
//! - `ReactorError`: fatal I/O failures that end the control loop
//! - `RelayError`: fatal errors surfaced by the relay runner
//! - `ProtocolError`: per-message decode failures, turned into `ErrorResponse`s
//! - `Rejection`: requests that break a relay rule, also turned into `ErrorResponse`s
//!
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Fatal reactor errors
///
/// The readiness poll itself failed. `Reactor::wait` never retries these.
#[derive(Debug, Error)]
pub enum ReactorError {
    /// Polling a watched source for readiness failed
    #[error("readiness poll failed: {0}")]
    Poll(#[source] std::io::Error),
}

/// Protocol-level decode errors
///
/// Never cross the dispatch boundary: `Registry::dispatch` converts each of
/// these into an `ErrorResponse` for the peer.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The text was not a structured tree at all
    #[error("unparseable request: {0}")]
    Parse(#[source] serde_json::Error),

    /// The tree lacks a `type` or an `object` field
    #[error("Invalid request specified (json=\"{tree}\")")]
    MalformedEnvelope { tree: String },

    /// The tag is not registered
    #[error("Invalid object type tag specified (type=\"{tag}\")")]
    UnknownType { tag: String },

    /// The tag is known but the inner object does not decode
    #[error("Object was incorrectly defined for {kind}, json={payload}")]
    BadObject {
        kind: &'static str,
        payload: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Fatal relay errors
///
/// Returned from `RelayServer::bind` and `RelayServer::run`; either one
/// ends the relay.
#[derive(Debug, Error)]
pub enum RelayError {
    /// IO error (bind, local address)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Reactor failure
    #[error(transparent)]
    Reactor(#[from] ReactorError),
}

/// A request that breaks a relay rule
///
/// Reported to the requesting peer as an `ErrorResponse`; the connection
/// stays open.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    /// Another peer already holds this username
    #[error("Username '{0}' is in use")]
    UserNameInUse(String),

    /// Empty, whitespace-only or reserved username
    #[error("Invalid username")]
    InvalidUserName,

    /// Connection sent a second login
    #[error("Already logged in as '{0}'")]
    AlreadyLoggedIn(String),

    /// Connection sent a message before logging in
    #[error("Not logged in")]
    NotLoggedIn,

    /// Request arrived outside any known connection
    #[error("Request from unknown connection")]
    UnknownConnection,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relay_error_wraps_io() {
        let err = RelayError::from(std::io::Error::other("boom"));
        assert!(matches!(err, RelayError::Io(_)));
        assert_eq!(err.to_string(), "IO error: boom");
    }

    #[test]
    fn test_rejection_messages() {
        assert_eq!(
            Rejection::UserNameInUse("alice".into()).to_string(),
            "Username 'alice' is in use"
        );
        assert_eq!(Rejection::NotLoggedIn.to_string(), "Not logged in");
    }

    #[test]
    fn test_protocol_error_messages() {
        let err = ProtocolError::UnknownType { tag: "nope".into() };
        assert_eq!(err.to_string(), "Invalid object type tag specified (type=\"nope\")");
    }
}
