//! Connection multiplexer
//!
//! The [`Reactor`] lets one control thread watch a listening endpoint, any
//! number of connections, a console source and a wake channel at once.
//! [`Reactor::wait`] blocks until one of them is ready and hands exactly one
//! event to an [`ActivityHandler`].
//!
//! When several sources are ready together the order is fixed:
//! wake signal, console, listener, then connections in registration order.
//!
//! `wait` is meant for a single control task. The only cross-thread entry
//! point is [`ReactorHandle::cancel`].

use std::future::poll_fn;
use std::io;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use crate::connection::{Connection, Listener};
use crate::console::ConsoleSource;
use crate::error::ReactorError;
use crate::types::ConnectionId;

/// Receives the one event a `wait` call produces
///
/// Each method gets the reactor back so it can change the watch set.
#[allow(async_fn_in_trait)]
pub trait ActivityHandler {
    /// The listener produced a new connection (not yet watched)
    async fn on_listener(&mut self, reactor: &mut Reactor, connection: Arc<Connection>);

    /// A watched connection is readable, or was closed and should be reaped
    async fn on_connection(&mut self, reactor: &mut Reactor, connection: Arc<Connection>);

    /// A line arrived on the console, without its line ending
    async fn on_console_line(&mut self, reactor: &mut Reactor, line: String);
}

/// One ready source
#[derive(Debug)]
pub enum Activity {
    Cancelled,
    Console(String),
    Accepted(Arc<Connection>),
    Readable(Arc<Connection>),
    /// Accept failed; the listener stays installed
    AcceptFailed(io::Error),
}

/// How a `wait` call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Exactly one handler method ran
    Dispatched,
    /// A cancel was delivered; no I/O was processed
    Cancelled,
    /// Nothing became ready in time
    TimedOut,
    /// A transient accept failure was logged; no handler ran
    Idle,
}

/// Cross-thread cancel handle
///
/// Cheap to clone and `Send`, so it can live in a signal task or another thread.
#[derive(Debug, Clone)]
pub struct ReactorHandle {
    wake: mpsc::Sender<()>,
}

impl ReactorHandle {
    /// Make the current (or next) `wait` return without processing I/O
    ///
    /// Cancels issued before a `wait` observes them coalesce into one.
    pub fn cancel(&self) {
        match self.wake.try_send(()) {
            Ok(()) => debug!("Cancel signal queued"),
            Err(TrySendError::Full(())) => debug!("Cancel signal already pending"),
            Err(TrySendError::Closed(())) => debug!("Cancel signal dropped, reactor is gone"),
        }
    }
}

/// Readiness multiplexer over connections, a listener and the console
#[derive(Debug)]
pub struct Reactor {
    connections: Vec<Arc<Connection>>,
    listener: Option<Listener>,
    console: Option<ConsoleSource>,
    // Capacity 1: a pending wake absorbs any further cancels.
    wake_tx: mpsc::Sender<()>,
    wake_rx: mpsc::Receiver<()>,
}

impl Reactor {
    pub fn new() -> Self {
        let (wake_tx, wake_rx) = mpsc::channel(1);
        Self {
            connections: Vec::new(),
            listener: None,
            console: None,
            wake_tx,
            wake_rx,
        }
    }

    /// Handle for cancelling `wait` from elsewhere
    pub fn handle(&self) -> ReactorHandle {
        ReactorHandle {
            wake: self.wake_tx.clone(),
        }
    }

    /// Same as `self.handle().cancel()`
    pub fn cancel(&self) {
        self.handle().cancel();
    }

    /// Watch a connection; returns `false` if it was already watched
    pub fn register_connection(&mut self, connection: Arc<Connection>) -> bool {
        if self.is_watching(connection.id()) {
            return false;
        }
        debug!("Watching connection {}", connection.id());
        self.connections.push(connection);
        true
    }

    /// Stop watching a connection; no-op if absent
    pub fn unregister_connection(&mut self, id: ConnectionId) -> Option<Arc<Connection>> {
        let idx = self.connections.iter().position(|c| c.id() == id)?;
        debug!("No longer watching connection {}", id);
        Some(self.connections.remove(idx))
    }

    pub fn is_watching(&self, id: ConnectionId) -> bool {
        self.connections.iter().any(|c| c.id() == id)
    }

    /// Watched connections in registration order
    pub fn connections(&self) -> impl Iterator<Item = &Arc<Connection>> {
        self.connections.iter()
    }

    /// Install or clear the listener, returning the previous one
    pub fn set_listener(&mut self, listener: Option<Listener>) -> Option<Listener> {
        std::mem::replace(&mut self.listener, listener)
    }

    pub fn listener(&self) -> Option<&Listener> {
        self.listener.as_ref()
    }

    /// Install or clear the console, returning the previous one
    pub fn set_console(&mut self, console: Option<ConsoleSource>) -> Option<ConsoleSource> {
        std::mem::replace(&mut self.console, console)
    }

    pub fn has_console(&self) -> bool {
        self.console.is_some()
    }

    /// Block until one source is ready and dispatch it
    ///
    /// `timeout` of `None` waits forever. A failed readiness poll is fatal.
    pub async fn wait<H>(
        &mut self,
        handler: &mut H,
        timeout: Option<Duration>,
    ) -> Result<WaitOutcome, ReactorError>
    where
        H: ActivityHandler,
    {
        let Some(activity) = self.next_activity(timeout).await? else {
            return Ok(WaitOutcome::TimedOut);
        };

        match activity {
            Activity::Cancelled => {
                debug!("Received cancel signal");
                Ok(WaitOutcome::Cancelled)
            }
            Activity::Console(line) => {
                handler.on_console_line(self, line).await;
                Ok(WaitOutcome::Dispatched)
            }
            Activity::Accepted(connection) => {
                handler.on_listener(self, connection).await;
                Ok(WaitOutcome::Dispatched)
            }
            Activity::Readable(connection) => {
                handler.on_connection(self, connection).await;
                Ok(WaitOutcome::Dispatched)
            }
            Activity::AcceptFailed(e) => {
                warn!("Failed to accept connection: {}", e);
                Ok(WaitOutcome::Idle)
            }
        }
    }

    /// Block until one source is ready and return it without dispatching
    ///
    /// `Ok(None)` means the timeout elapsed.
    pub async fn next_activity(
        &mut self,
        timeout: Option<Duration>,
    ) -> Result<Option<Activity>, ReactorError> {
        let ready = poll_fn(|cx| self.poll_activity(cx));

        match timeout {
            Some(limit) => match tokio::time::timeout(limit, ready).await {
                Ok(result) => result.map(Some),
                Err(_) => Ok(None),
            },
            None => ready.await.map(Some),
        }
    }

    fn poll_activity(&mut self, cx: &mut Context<'_>) -> Poll<Result<Activity, ReactorError>> {
        if let Poll::Ready(Some(())) = self.wake_rx.poll_recv(cx) {
            return Poll::Ready(Ok(Activity::Cancelled));
        }

        if let Some(console) = &mut self.console {
            match console.poll_line(cx) {
                Poll::Ready(Some(line)) => return Poll::Ready(Ok(Activity::Console(line))),
                Poll::Ready(None) => {
                    debug!("Console closed, no longer watching it");
                    self.console = None;
                }
                Poll::Pending => {}
            }
        }

        if let Some(listener) = &self.listener {
            match listener.poll_accept(cx) {
                Poll::Ready(Ok(connection)) => {
                    return Poll::Ready(Ok(Activity::Accepted(Arc::new(connection))));
                }
                Poll::Ready(Err(e)) => return Poll::Ready(Ok(Activity::AcceptFailed(e))),
                Poll::Pending => {}
            }
        }

        for connection in &self.connections {
            // Closed connections are reported so their owner can reap them.
            if !connection.is_open() {
                return Poll::Ready(Ok(Activity::Readable(Arc::clone(connection))));
            }
            match connection.poll_read_ready(cx) {
                Poll::Ready(Ok(())) => {
                    return Poll::Ready(Ok(Activity::Readable(Arc::clone(connection))));
                }
                Poll::Ready(Err(e)) => return Poll::Ready(Err(ReactorError::Poll(e))),
                Poll::Pending => {}
            }
        }

        Poll::Pending
    }
}

impl Default for Reactor {
    fn default() -> Self {
        Self::new()
    }
}
