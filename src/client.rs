//! Client struct definition
//!
//! Represents a connected client with their state and connection.

use std::io;
use std::sync::Arc;

use crate::connection::Connection;
use crate::framing::LineBuffer;
use crate::message::Envelope;
use crate::types::ConnectionId;

/// Connected client information
///
/// Holds all state related to a connected client including their
/// connection, username, and partially received lines.
#[derive(Debug)]
pub struct Client {
    /// Unique identifier for this client (same as its connection's)
    pub id: ConnectionId,
    /// Username (None before login)
    pub username: Option<String>,
    /// Shared with the reactor's watch set
    pub connection: Arc<Connection>,
    /// Bytes not yet forming a full line
    inbound: LineBuffer,
}

impl Client {
    /// Create a new client for an accepted connection
    pub fn new(connection: Arc<Connection>) -> Self {
        Self {
            id: connection.id(),
            username: None,
            connection,
            inbound: LineBuffer::new(),
        }
    }

    /// Send an envelope to this client as one line
    ///
    /// Returns an error if the write fails; the connection is then closed
    /// and gets reaped on its next readiness.
    pub async fn send(&self, envelope: &Envelope) -> io::Result<()> {
        let mut line = envelope.to_json(false);
        line.push('\n');
        self.connection.write(line.as_bytes()).await?;
        Ok(())
    }

    /// Feed freshly read bytes, returning complete lines
    pub fn receive(&mut self, bytes: &[u8]) -> Vec<String> {
        self.inbound.push(bytes)
    }

    /// Get the display name for this client
    ///
    /// Returns the username if set, otherwise "Unknown".
    pub fn display_name(&self) -> &str {
        self.username.as_deref().unwrap_or("Unknown")
    }

    /// Set the client's username
    pub fn set_username(&mut self, username: String) {
        self.username = Some(username);
    }
}
