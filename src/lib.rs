//! Line-oriented TCP Chat Relay Library
//!
//! A small chat relay: clients connect over plain TCP, log in with a
//! username and exchange messages as newline-delimited JSON envelopes.
//!
//! # Features
//! - Single-threaded readiness reactor over listener, connections and stdin
//! - Cross-thread cancellation of a blocked wait
//! - Typed envelopes with stable wire tags
//! - Tag-keyed dispatch registry; new kinds are added by registration
//! - Username login with duplicate detection
//! - Broadcast of logins and messages, errors back to the sender only
//! - Operator console (`list`, `exit`, free-text announcements)
//!
//! # Architecture
//! One control task owns everything:
//! - `Reactor` waits for exactly one ready source per `wait` and calls the
//!   matching `ActivityHandler` method
//! - `ChatServer` is the handler; it keeps the client table and routes each
//!   decoded line through a `Registry`
//! - No locks needed - state is only touched from the control task
//!
//! # Example
//! ```ignore
//! use chat_relay::{RelayConfig, RelayServer};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let server = RelayServer::bind(RelayConfig::default()).await.unwrap();
//!     let shutdown = server.shutdown_handle();
//!
//!     tokio::spawn(async move {
//!         let _ = tokio::signal::ctrl_c().await;
//!         shutdown.shutdown();
//!     });
//!
//!     server.run().await.unwrap();
//! }
//! ```

pub mod client;
pub mod config;
pub mod connection;
pub mod console;
pub mod error;
pub mod framing;
pub mod message;
pub mod reactor;
pub mod registry;
pub mod server;
pub mod types;

// Re-export main types for convenience
pub use client::Client;
pub use config::RelayConfig;
pub use connection::{Connection, Listener, ReadOutcome};
pub use console::ConsoleSource;
pub use error::{ProtocolError, ReactorError, Rejection, RelayError};
pub use message::{
    Envelope, ErrorCode, ErrorResponse, Kind, LoginRequest, LoginResponse, MessageRequest,
    MessageResponse,
};
pub use reactor::{Activity, ActivityHandler, Reactor, ReactorHandle, WaitOutcome};
pub use registry::{Registry, RequestVisitor, ResponseVisitor};
pub use server::{ChatServer, RelayServer, ShutdownHandle};
pub use types::ConnectionId;
