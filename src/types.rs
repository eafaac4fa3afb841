//! Basic type definitions for the relay
//!
//! Provides newtype wrappers for type safety:
//! - `ConnectionId`: UUID-based identity of one accepted connection

use uuid::Uuid;

/// Unique connection identifier (newtype pattern)
///
/// Wraps a UUID v4. Used as the key of the relay's peer table and to keep
/// the reactor's watch set free of duplicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Create a new random connection ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The short form is enough to tell peers apart in logs.
        let simple = self.0.simple().to_string();
        write!(f, "{}", &simple[..8])
    }
}
