//! Relay server
//!
//! `ChatServer` owns all relay state: the connected clients and the request
//! registry. It reacts to the one event each `Reactor::wait` produces.
//! `RelayServer` binds the listener and drives the wait loop until stopped.
//!
//! Everything here runs on the single control task, so the client table
//! needs no locking.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::client::Client;
use crate::config::RelayConfig;
use crate::connection::{Connection, Listener, ReadOutcome};
use crate::console::ConsoleSource;
use crate::error::{Rejection, RelayError};
use crate::message::{
    codec, Envelope, ErrorResponse, LoginRequest, LoginResponse, MessageRequest, MessageResponse,
    SERVER_SENDER,
};
use crate::reactor::{ActivityHandler, Reactor, ReactorHandle};
use crate::registry::{Registry, RequestVisitor};
use crate::types::ConnectionId;

/// Connected clients, keyed by connection
///
/// Also the state the request registry dispatches against; `origin` names
/// the connection whose line is being handled.
#[derive(Debug, Default)]
pub struct Clients {
    by_id: HashMap<ConnectionId, Client>,
    origin: Option<ConnectionId>,
}

impl Clients {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, client: Client) {
        self.by_id.insert(client.id, client);
    }

    pub fn remove(&mut self, id: ConnectionId) -> Option<Client> {
        self.by_id.remove(&id)
    }

    pub fn get(&self, id: ConnectionId) -> Option<&Client> {
        self.by_id.get(&id)
    }

    pub fn get_mut(&mut self, id: ConnectionId) -> Option<&mut Client> {
        self.by_id.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Client> {
        self.by_id.values()
    }

    /// Usernames of logged-in clients, sorted
    pub fn usernames(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .by_id
            .values()
            .filter_map(|c| c.username.as_deref())
            .collect();
        names.sort_unstable();
        names
    }

    /// Attribute the next dispatched requests to `origin`
    pub fn set_origin(&mut self, origin: Option<ConnectionId>) {
        self.origin = origin;
    }

    fn origin_mut(&mut self) -> Result<&mut Client, Rejection> {
        let id = self.origin.ok_or(Rejection::UnknownConnection)?;
        self.by_id.get_mut(&id).ok_or(Rejection::UnknownConnection)
    }

    /// Claim `username` for the origin connection
    fn login(&mut self, username: &str) -> Result<(), Rejection> {
        // `@`-prefixed names are reserved for relay identities.
        if username.trim().is_empty() || username.starts_with('@') {
            return Err(Rejection::InvalidUserName);
        }

        if self
            .by_id
            .values()
            .any(|c| c.username.as_deref() == Some(username))
        {
            return Err(Rejection::UserNameInUse(username.to_string()));
        }

        let client = self.origin_mut()?;
        if let Some(current) = &client.username {
            return Err(Rejection::AlreadyLoggedIn(current.clone()));
        }

        client.set_username(username.to_string());
        info!("Client {} logged in as '{}'", client.id, username);
        Ok(())
    }
}

impl RequestVisitor for Clients {
    type Output = Envelope;

    fn visit_login(&mut self, request: LoginRequest) -> Envelope {
        match self.login(request.username()) {
            Ok(()) => LoginResponse::new(request.username()).into(),
            Err(e) => {
                debug!("Login as '{}' rejected: {}", request.username(), e);
                ErrorResponse::from(e).into()
            }
        }
    }

    fn visit_message(&mut self, request: MessageRequest) -> Envelope {
        let client = match self.origin_mut() {
            Ok(client) => client,
            Err(e) => return ErrorResponse::from(e).into(),
        };

        // The registered name is authoritative, not the claimed sender.
        match &client.username {
            Some(username) => MessageResponse::new(username.clone(), request.content()).into(),
            None => ErrorResponse::from(Rejection::NotLoggedIn).into(),
        }
    }
}

/// Relay state and event handling
pub struct ChatServer {
    clients: Clients,
    registry: Registry<Clients, Envelope>,
    stop: Arc<AtomicBool>,
}

impl ChatServer {
    pub fn new(stop: Arc<AtomicBool>) -> Self {
        Self {
            clients: Clients::new(),
            registry: Registry::requests(),
            stop,
        }
    }

    pub fn clients(&self) -> &Clients {
        &self.clients
    }

    /// Interpret one line from `origin`
    ///
    /// Never fails: unparseable or malformed input yields an `ErrorResponse`.
    pub fn handle_line(&mut self, origin: ConnectionId, line: &str) -> Envelope {
        self.clients.set_origin(Some(origin));
        let response = match codec::parse(line) {
            Ok(tree) => self.registry.dispatch(&mut self.clients, &tree),
            Err(e) => ErrorResponse::from(e).into(),
        };
        self.clients.set_origin(None);
        response
    }

    /// Deliver a response: errors go back to `origin`, the rest to everyone
    async fn route(&self, origin: ConnectionId, response: Envelope) {
        if response.is_error() {
            if let Some(client) = self.clients.get(origin) {
                if let Err(e) = client.send(&response).await {
                    warn!("Failed to send error to {}: {}", origin, e);
                }
            }
        } else {
            self.broadcast(&response).await;
        }
    }

    /// Write an envelope to every live client; failures are not retried
    async fn broadcast(&self, envelope: &Envelope) {
        debug!("Broadcasting {} to {} clients", envelope.tag(), self.clients.len());
        for client in self.clients.iter() {
            if !client.connection.is_open() {
                continue;
            }
            if let Err(e) = client.send(envelope).await {
                warn!("Failed to send to {}: {}", client.id, e);
            }
        }
    }

    /// Drop a client from both the table and the watch set
    fn disconnect(&mut self, reactor: &mut Reactor, id: ConnectionId) {
        reactor.unregister_connection(id);
        if let Some(client) = self.clients.remove(id) {
            client.connection.close();
            info!("Client {} ({}) disconnected", id, client.display_name());
        }
        debug!("Total clients: {}", self.clients.len());
    }

    /// Close and forget every client
    pub fn close_all(&mut self, reactor: &mut Reactor) {
        let ids: Vec<ConnectionId> = self.clients.iter().map(|c| c.id).collect();
        for id in ids {
            self.disconnect(reactor, id);
        }
    }
}

impl ActivityHandler for ChatServer {
    async fn on_listener(&mut self, reactor: &mut Reactor, connection: Arc<Connection>) {
        match connection.peer_addr() {
            Some(addr) => info!("Client {} connected from {}", connection.id(), addr),
            None => info!("Client {} connected", connection.id()),
        }

        reactor.register_connection(Arc::clone(&connection));
        self.clients.insert(Client::new(connection));
        debug!("Total clients: {}", self.clients.len());
    }

    async fn on_connection(&mut self, reactor: &mut Reactor, connection: Arc<Connection>) {
        let id = connection.id();

        let bytes = match connection.try_read() {
            Ok(ReadOutcome::Data(bytes)) => bytes,
            Ok(ReadOutcome::WouldBlock) => return,
            Ok(ReadOutcome::Eof) => {
                self.disconnect(reactor, id);
                return;
            }
            Err(e) => {
                warn!("Read from {} failed: {}", id, e);
                self.disconnect(reactor, id);
                return;
            }
        };

        let Some(client) = self.clients.get_mut(id) else {
            warn!("Data from unknown connection {}, dropping it", id);
            reactor.unregister_connection(id);
            connection.close();
            return;
        };
        let lines = client.receive(&bytes);

        for line in lines {
            let response = self.handle_line(id, &line);
            self.route(id, response).await;
        }
    }

    async fn on_console_line(&mut self, reactor: &mut Reactor, line: String) {
        match line.trim() {
            "" => {}
            "exit" | "quit" => {
                info!("Stop requested from console");
                self.stop.store(true, Ordering::Release);
                self.close_all(reactor);
            }
            "list" => {
                info!(
                    "{} clients connected, logged in: {:?}",
                    self.clients.len(),
                    self.clients.usernames()
                );
            }
            text => {
                let announcement = MessageResponse::new(SERVER_SENDER, text).into();
                self.broadcast(&announcement).await;
            }
        }
    }
}

/// Stops a running `RelayServer` from any thread
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    stop: Arc<AtomicBool>,
    reactor: ReactorHandle,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.stop.store(true, Ordering::Release);
        self.reactor.cancel();
    }
}

/// Listener, reactor and chat state wired together
pub struct RelayServer {
    reactor: Reactor,
    server: ChatServer,
    stop: Arc<AtomicBool>,
    config: RelayConfig,
}

impl RelayServer {
    /// Bind the listener and, if configured, attach stdin
    pub async fn bind(config: RelayConfig) -> Result<Self, RelayError> {
        let listener = Listener::bind(&config.bind_addr).await?;

        let mut reactor = Reactor::new();
        reactor.set_listener(Some(listener));
        if config.console {
            reactor.set_console(Some(ConsoleSource::stdin()));
        }

        let stop = Arc::new(AtomicBool::new(false));
        Ok(Self {
            reactor,
            server: ChatServer::new(Arc::clone(&stop)),
            stop,
            config,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, RelayError> {
        match self.reactor.listener() {
            Some(listener) => Ok(listener.local_addr()?),
            None => Err(std::io::Error::from(std::io::ErrorKind::NotConnected).into()),
        }
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            stop: Arc::clone(&self.stop),
            reactor: self.reactor.handle(),
        }
    }

    /// Run the wait loop until stopped
    ///
    /// Only a fatal reactor error ends it early.
    pub async fn run(mut self) -> Result<(), RelayError> {
        info!("Relay started on {}", self.config.bind_addr);

        while !self.stop.load(Ordering::Acquire) {
            self.reactor
                .wait(&mut self.server, Some(self.config.poll_interval))
                .await?;
        }

        self.server.close_all(&mut self.reactor);
        info!("Relay shutting down");
        Ok(())
    }
}
