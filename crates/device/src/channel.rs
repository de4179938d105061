//! Byte channel to a device.
//!
//! Wraps whatever the transport produced (an SSH channel stream, a TCP
//! stream, a tty) behind one buffered reader/writer pair with delimiter and
//! pattern waits.

use std::time::Duration;

use junos_core::{Error, Result};
use regex::bytes::Regex;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::telnet::{TelnetFilter, escape_outgoing};

const READ_CHUNK: usize = 8192;

type Reader = Box<dyn AsyncRead + Send + Unpin>;
type Writer = Box<dyn AsyncWrite + Send + Unpin>;

/// Buffered, bidirectional byte channel.
pub struct Channel {
    reader: Reader,
    writer: Writer,
    buffer: Vec<u8>,
    telnet: Option<TelnetFilter>,
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("buffered", &self.buffer.len())
            .field("telnet", &self.telnet.is_some())
            .finish_non_exhaustive()
    }
}

impl Channel {
    /// Create a channel over a reader/writer pair.
    pub fn new(
        reader: impl AsyncRead + Send + Unpin + 'static,
        writer: impl AsyncWrite + Send + Unpin + 'static,
    ) -> Self {
        Self {
            reader: Box::new(reader),
            writer: Box::new(writer),
            buffer: Vec::new(),
            telnet: None,
        }
    }

    /// Treat the stream as telnet: strip commands and refuse options.
    #[must_use]
    pub fn with_telnet(mut self) -> Self {
        self.telnet = Some(TelnetFilter::new());
        self
    }

    /// Write `data` and flush.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the write fails.
    pub async fn send(&mut self, data: &[u8]) -> Result<()> {
        let data = if self.telnet.is_some() {
            escape_outgoing(data)
        } else {
            data.to_vec()
        };
        trace!(bytes = data.len(), "channel send");
        self.writer
            .write_all(&data)
            .await
            .map_err(|e| Error::transport(format!("write failed: {e}")))?;
        self.writer
            .flush()
            .await
            .map_err(|e| Error::transport(format!("flush failed: {e}")))
    }

    /// Read until `delimiter`, returning everything before it.
    ///
    /// The delimiter is consumed; bytes after it stay buffered.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] when the delimiter does not arrive in time
    /// and [`Error::Transport`] when the peer closes the stream.
    pub async fn read_until(
        &mut self,
        delimiter: &[u8],
        timeout: Duration,
        waiting_for: &str,
    ) -> Result<Vec<u8>> {
        tokio::time::timeout(timeout, self.read_until_inner(delimiter))
            .await
            .map_err(|_| Error::timeout(waiting_for, timeout.as_secs()))?
    }

    async fn read_until_inner(&mut self, delimiter: &[u8]) -> Result<Vec<u8>> {
        loop {
            if let Some(pos) = find(&self.buffer, delimiter) {
                let rest = self.buffer.split_off(pos);
                let message = std::mem::replace(&mut self.buffer, rest);
                self.buffer.drain(..delimiter.len());
                return Ok(message);
            }
            self.fill().await?;
        }
    }

    /// Wait until one of `patterns` matches the buffered input.
    ///
    /// Returns the index of the matching pattern and consumes the buffer up to
    /// the end of the match.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] when nothing matches in time and
    /// [`Error::Transport`] when the peer closes the stream.
    pub async fn expect(
        &mut self,
        patterns: &[&Regex],
        timeout: Duration,
        waiting_for: &str,
    ) -> Result<usize> {
        tokio::time::timeout(timeout, self.expect_inner(patterns))
            .await
            .map_err(|_| Error::timeout(waiting_for, timeout.as_secs()))?
    }

    async fn expect_inner(&mut self, patterns: &[&Regex]) -> Result<usize> {
        loop {
            let hit = patterns.iter().enumerate().find_map(|(index, pattern)| {
                pattern.find(&self.buffer).map(|m| (index, m.end()))
            });
            if let Some((index, end)) = hit {
                self.buffer.drain(..end);
                return Ok(index);
            }
            self.fill().await?;
        }
    }

    async fn fill(&mut self) -> Result<()> {
        let mut chunk = vec![0u8; READ_CHUNK];
        let read = self
            .reader
            .read(&mut chunk)
            .await
            .map_err(|e| Error::transport(format!("read failed: {e}")))?;
        if read == 0 {
            return Err(Error::transport("connection closed by peer"));
        }
        chunk.truncate(read);

        match self.telnet.as_mut() {
            Some(filter) => {
                let filtered = filter.feed(&chunk);
                if !filtered.replies.is_empty() {
                    self.writer
                        .write_all(&filtered.replies)
                        .await
                        .map_err(|e| Error::transport(format!("write failed: {e}")))?;
                }
                self.buffer.extend_from_slice(&filtered.data);
            }
            None => self.buffer.extend_from_slice(&chunk),
        }
        Ok(())
    }

    /// Close the write side.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the stream refuses to shut down.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.writer
            .shutdown()
            .await
            .map_err(|e| Error::transport(format!("shutdown failed: {e}")))
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    const WAIT: Duration = Duration::from_secs(2);

    fn duplex_channel() -> (Channel, tokio::io::DuplexStream) {
        let (ours, theirs) = tokio::io::duplex(4096);
        let (reader, writer) = tokio::io::split(ours);
        (Channel::new(reader, writer), theirs)
    }

    #[tokio::test]
    async fn test_read_until_keeps_trailing_bytes() {
        let (mut channel, mut peer) = duplex_channel();
        peer.write_all(b"<hello/>]]>]]><rpc-reply/>]]>]]>").await.unwrap();

        let first = channel.read_until(b"]]>]]>", WAIT, "hello").await.unwrap();
        let second = channel.read_until(b"]]>]]>", WAIT, "reply").await.unwrap();
        assert_eq!(first, b"<hello/>");
        assert_eq!(second, b"<rpc-reply/>");
    }

    #[tokio::test]
    async fn test_read_until_reports_closed_peer() {
        let (mut channel, mut peer) = duplex_channel();
        peer.write_all(b"partial").await.unwrap();
        drop(peer);

        let err = channel.read_until(b"]]>]]>", WAIT, "hello").await.err().unwrap();
        assert!(matches!(err, Error::Transport { .. }));
    }

    #[tokio::test]
    async fn test_read_until_times_out() {
        let (mut channel, _peer) = duplex_channel();
        let err = channel
            .read_until(b"]]>]]>", Duration::from_millis(50), "hello")
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_expect_returns_matching_pattern() {
        let (mut channel, mut peer) = duplex_channel();
        peer.write_all(b"\r\nsrx1 (ttyu0)\r\n\r\nlogin: ").await.unwrap();

        let password = Regex::new(r"(?i)password:\s*$").unwrap();
        let login = Regex::new(r"(?i)login:\s*$").unwrap();
        let index = channel.expect(&[&password, &login], WAIT, "login").await.unwrap();
        assert_eq!(index, 1);
    }

    struct BrokenWriter;

    impl AsyncWrite for BrokenWriter {
        fn poll_write(
            self: std::pin::Pin<&mut Self>,
            _: &mut std::task::Context<'_>,
            buf: &[u8],
        ) -> std::task::Poll<std::io::Result<usize>> {
            std::task::Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(
            self: std::pin::Pin<&mut Self>,
            _: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Ready(Ok(()))
        }

        fn poll_shutdown(
            self: std::pin::Pin<&mut Self>,
            _: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Ready(Err(std::io::ErrorKind::BrokenPipe.into()))
        }
    }

    #[tokio::test]
    async fn test_shutdown_reports_write_side_failure() {
        let mut channel = Channel::new(tokio::io::empty(), BrokenWriter);

        let err = channel.shutdown().await.err().unwrap();
        assert!(matches!(err, Error::Transport { .. }));
        assert!(err.to_string().contains("shutdown failed"));
    }

    #[tokio::test]
    async fn test_telnet_channel_answers_negotiation() {
        let (ours, mut theirs) = tokio::io::duplex(4096);
        let (reader, writer) = tokio::io::split(ours);
        let mut channel = Channel::new(reader, writer).with_telnet();

        theirs.write_all(&[255, 253, 24, b'o', b'k', b'!']).await.unwrap();
        let data = channel.read_until(b"!", WAIT, "data").await.unwrap();
        assert_eq!(data, b"ok");

        let mut reply = [0u8; 3];
        theirs.read_exact(&mut reply).await.unwrap();
        assert_eq!(reply, [255, 252, 24]);
    }
}
