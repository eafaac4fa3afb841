//! Console input source
//!
//! Lines typed at the operator console reach the reactor through a channel.
//! A reader task owns the actual input stream so the control thread never
//! blocks on it.

use std::task::{Context, Poll};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Lines buffered between the reader task and the reactor
const LINE_BUFFER_SIZE: usize = 64;

/// Line-buffered console input
#[derive(Debug)]
pub struct ConsoleSource {
    lines: mpsc::Receiver<String>,
}

impl ConsoleSource {
    /// Console fed by the process's stdin
    ///
    /// Must be called from inside a tokio runtime.
    pub fn stdin() -> Self {
        Self::from_reader(tokio::io::stdin())
    }

    /// Console fed by any byte stream, split into lines
    ///
    /// Must be called from inside a tokio runtime.
    pub fn from_reader<R>(reader: R) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (tx, source) = Self::channel();

        tokio::spawn(async move {
            let mut lines = BufReader::new(reader).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if tx.send(line).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => {
                        debug!("Console input reached EOF");
                        break;
                    }
                    Err(e) => {
                        warn!("Console read failed: {}", e);
                        break;
                    }
                }
            }
        });

        source
    }

    /// Console fed directly through a channel
    pub fn channel() -> (mpsc::Sender<String>, Self) {
        let (tx, lines) = mpsc::channel(LINE_BUFFER_SIZE);
        (tx, Self { lines })
    }

    /// Next line, `None` once the feeding side is gone
    pub(crate) fn poll_line(&mut self, cx: &mut Context<'_>) -> Poll<Option<String>> {
        self.lines
            .poll_recv(cx)
            .map(|line| line.map(|line| line.trim_end_matches(['\r', '\n']).to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::poll_fn;

    #[tokio::test]
    async fn test_reader_splits_lines() {
        let mut console = ConsoleSource::from_reader(&b"list\r\nexit\n"[..]);

        assert_eq!(poll_fn(|cx| console.poll_line(cx)).await.as_deref(), Some("list"));
        assert_eq!(poll_fn(|cx| console.poll_line(cx)).await.as_deref(), Some("exit"));
        assert_eq!(poll_fn(|cx| console.poll_line(cx)).await, None);
    }

    #[tokio::test]
    async fn test_channel_feed() {
        let (tx, mut console) = ConsoleSource::channel();
        tx.send("hello\n".to_string()).await.unwrap();
        drop(tx);

        assert_eq!(poll_fn(|cx| console.poll_line(cx)).await.as_deref(), Some("hello"));
        assert_eq!(poll_fn(|cx| console.poll_line(cx)).await, None);
    }
}
