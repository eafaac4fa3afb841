//! TCP connection and listening endpoint
//!
//! A [`Connection`] is shared (`Arc`) between the relay's peer table and the
//! reactor's watch set. Every operation takes `&self`: reads and writes go
//! through tokio's readiness API (`readable`/`try_read`, `writable`/`try_write`)
//! so no exclusive borrow of the stream is ever needed.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};

use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tracing::debug;

use crate::types::ConnectionId;

/// Bytes per socket read
pub const BUFFER_SIZE: usize = 1024;

/// Upper bound on chunks drained by one `Connection::try_read`
pub const MAX_READ_CHUNKS: usize = 64;

/// Result of one read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Bytes drained from the socket, never empty
    Data(Vec<u8>),
    /// Nothing to read right now (`try_read` only)
    WouldBlock,
    /// Peer closed, or the connection was already closed locally
    Eof,
}

/// One accepted (or dialed) byte stream
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    peer_addr: Option<SocketAddr>,
    stream: TcpStream,
    open: AtomicBool,
}

impl Connection {
    /// Wrap an established stream
    pub fn new(stream: TcpStream) -> Self {
        let peer_addr = stream.peer_addr().ok();
        Self {
            id: ConnectionId::new(),
            peer_addr,
            stream,
            open: AtomicBool::new(true),
        }
    }

    /// Dial a relay
    pub async fn connect(addr: impl ToSocketAddrs) -> io::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self::new(stream))
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Mark the connection closed
    ///
    /// The socket itself is released when the last handle is dropped.
    pub fn close(&self) {
        if self.open.swap(false, Ordering::AcqRel) {
            debug!("Connection {} closed", self.id);
        }
    }

    /// Drain everything currently available without waiting
    ///
    /// Meant for use after the reactor reported readiness. Reads until the
    /// socket would block, so that readiness is consumed and the next poll
    /// only fires on fresh bytes. Stops early after `MAX_READ_CHUNKS`
    /// chunks; the remainder keeps the stream ready.
    /// Any error closes the connection.
    pub fn try_read(&self) -> io::Result<ReadOutcome> {
        if !self.is_open() {
            return Ok(ReadOutcome::Eof);
        }

        let mut buf = [0u8; BUFFER_SIZE];
        let mut data = Vec::new();

        for _ in 0..MAX_READ_CHUNKS {
            match self.stream.try_read(&mut buf) {
                // Hand over what arrived first; EOF is reported next time.
                Ok(0) if !data.is_empty() => break,
                Ok(0) => {
                    self.close();
                    return Ok(ReadOutcome::Eof);
                }
                Ok(n) => data.extend_from_slice(&buf[..n]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    self.close();
                    return Err(e);
                }
            }
        }

        if data.is_empty() {
            Ok(ReadOutcome::WouldBlock)
        } else {
            Ok(ReadOutcome::Data(data))
        }
    }

    /// Wait until bytes (or EOF) arrive, then drain them
    ///
    /// Never returns `WouldBlock`. Any error closes the connection.
    pub async fn read(&self) -> io::Result<ReadOutcome> {
        loop {
            if !self.is_open() {
                return Ok(ReadOutcome::Eof);
            }

            if let Err(e) = self.stream.readable().await {
                self.close();
                return Err(e);
            }

            match self.try_read()? {
                // Spurious readiness, wait again
                ReadOutcome::WouldBlock => continue,
                outcome => return Ok(outcome),
            }
        }
    }

    /// Write all of `bytes`
    ///
    /// Returns the byte count. Any error closes the connection; nothing is retried.
    pub async fn write(&self, bytes: &[u8]) -> io::Result<usize> {
        if !self.is_open() {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "write to closed connection",
            ));
        }

        let mut written = 0;
        while written < bytes.len() {
            if let Err(e) = self.stream.writable().await {
                self.close();
                return Err(e);
            }

            match self.stream.try_write(&bytes[written..]) {
                Ok(0) => {
                    self.close();
                    return Err(io::ErrorKind::WriteZero.into());
                }
                Ok(n) => written += n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
                Err(e) => {
                    self.close();
                    return Err(e);
                }
            }
        }
        Ok(written)
    }

    /// Readiness hook for the reactor
    pub(crate) fn poll_read_ready(&self, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.stream.poll_read_ready(cx)
    }
}

/// Listening endpoint that produces connections
#[derive(Debug)]
pub struct Listener {
    inner: TcpListener,
}

impl Listener {
    pub async fn bind(addr: impl ToSocketAddrs) -> io::Result<Self> {
        let inner = TcpListener::bind(addr).await?;
        Ok(Self { inner })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }

    /// Wait for and accept the next connection
    pub async fn accept(&self) -> io::Result<Connection> {
        let (stream, _) = self.inner.accept().await?;
        Ok(Connection::new(stream))
    }

    /// Readiness hook for the reactor; readiness and accept are one step in tokio
    pub(crate) fn poll_accept(&self, cx: &mut Context<'_>) -> Poll<io::Result<Connection>> {
        self.inner
            .poll_accept(cx)
            .map_ok(|(stream, _)| Connection::new(stream))
    }
}

impl From<TcpListener> for Listener {
    fn from(inner: TcpListener) -> Self {
        Self { inner }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    async fn pair() -> (Connection, TcpStream) {
        let listener = Listener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (accepted, dialed) = tokio::join!(listener.accept(), TcpStream::connect(addr));
        (accepted.unwrap(), dialed.unwrap())
    }

    #[tokio::test]
    async fn test_read_data_then_eof() {
        let (conn, mut remote) = pair().await;
        assert!(conn.is_open());
        assert!(conn.peer_addr().is_some());

        remote.write_all(b"hello").await.unwrap();
        assert_eq!(conn.read().await.unwrap(), ReadOutcome::Data(b"hello".to_vec()));

        drop(remote);
        assert_eq!(conn.read().await.unwrap(), ReadOutcome::Eof);
        assert!(!conn.is_open());
    }

    #[tokio::test]
    async fn test_read_drains_then_try_read_would_block() {
        let (conn, mut remote) = pair().await;

        remote.write_all(b"one").await.unwrap();
        remote.write_all(b"two").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(conn.read().await.unwrap(), ReadOutcome::Data(b"onetwo".to_vec()));

        // Drained: nothing left and no waiting.
        assert_eq!(conn.try_read().unwrap(), ReadOutcome::WouldBlock);
        assert!(conn.is_open());

        drop(remote);
        assert_eq!(conn.read().await.unwrap(), ReadOutcome::Eof);
    }

    #[tokio::test]
    async fn test_write_after_close_fails() {
        let (conn, _remote) = pair().await;
        conn.close();
        let err = conn.write(b"x").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
        assert_eq!(conn.read().await.unwrap(), ReadOutcome::Eof);
    }

    #[tokio::test]
    async fn test_write_reaches_peer() {
        let (conn, mut remote) = pair().await;
        assert_eq!(conn.write(b"ping\n").await.unwrap(), 5);

        let mut buf = [0u8; 16];
        let n = remote.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"ping\n");
    }
}
