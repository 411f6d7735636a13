//! Reliable send/receive over an async byte stream.
//!
//! A single `write` or `read` on a socket may move fewer bytes than asked
//! for. [`Transport`] loops until the caller's request is satisfied, and
//! races every call against a [`CancelToken`]: when cancellation fires the
//! connection is dropped and the call returns [`AgencyError::Cancelled`].

pub mod cancel;
#[cfg(test)]
pub(crate) mod mock;

pub use cancel::{cancel_pair, CancelHandle, CancelToken};

use crate::error::{AgencyError, Result};
use bytes::{Bytes, BytesMut};
use std::future::Future;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

/// Scratch size for reads whose length isn't known up front.
pub const READ_BUFFER_SIZE: usize = 1024;

/// Owns one connection to the aggregator.
pub struct Transport<S> {
    stream: Option<S>,
    cancel: CancelToken,
    scratch: Vec<u8>,
    bytes_sent: u64,
    bytes_received: u64,
}

/// Run `fut` unless cancellation fires first.
async fn guarded<F: Future>(cancel: &mut CancelToken, fut: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        out = fut => Some(out),
    }
}

impl Transport<TcpStream> {
    /// Open a TCP connection to `addr`.
    pub async fn connect(addr: &str, timeout: Duration, mut cancel: CancelToken) -> Result<Self> {
        let attempt = tokio::time::timeout(timeout, TcpStream::connect(addr));
        let stream = match guarded(&mut cancel, attempt).await {
            None => return Err(AgencyError::Cancelled),
            Some(Err(_)) => {
                return Err(AgencyError::Connection {
                    addr: addr.to_string(),
                    source: io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("no connection after {:?}", timeout),
                    ),
                })
            }
            Some(Ok(res)) => res.map_err(|source| AgencyError::Connection {
                addr: addr.to_string(),
                source,
            })?,
        };
        stream.set_nodelay(true)?;
        tracing::debug!(addr, "connected");
        Ok(Self::new(stream, cancel))
    }
}

impl<S> Transport<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, cancel: CancelToken) -> Self {
        Self {
            stream: Some(stream),
            cancel,
            scratch: vec![0u8; READ_BUFFER_SIZE],
            bytes_sent: 0,
            bytes_received: 0,
        }
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    pub fn bytes_received(&self) -> u64 {
        self.bytes_received
    }

    /// Drop the connection after a cancellation.
    fn abort(&mut self) -> AgencyError {
        if self.stream.take().is_some() {
            tracing::debug!("connection dropped on cancellation");
        }
        AgencyError::Cancelled
    }

    /// Write every byte of `data`, however many writes it takes.
    pub async fn send_all(&mut self, data: &[u8]) -> Result<()> {
        let mut sent = 0;
        while sent < data.len() {
            let stream = self.stream.as_mut().ok_or(AgencyError::Closed)?;
            let n = match guarded(&mut self.cancel, stream.write(&data[sent..])).await {
                None => return Err(self.abort()),
                Some(res) => res?,
            };
            if n == 0 {
                return Err(AgencyError::PrematureClose {
                    expected: data.len(),
                    received: sent,
                });
            }
            sent += n;
            self.bytes_sent += n as u64;
            tracing::trace!(n, sent, total = data.len(), "write");
        }
        Ok(())
    }

    /// Read exactly `n` bytes.
    pub async fn recv_exact(&mut self, n: usize) -> Result<Bytes> {
        let mut buf = BytesMut::zeroed(n);
        let mut filled = 0;
        while filled < n {
            let stream = self.stream.as_mut().ok_or(AgencyError::Closed)?;
            let read = match guarded(&mut self.cancel, stream.read(&mut buf[filled..])).await {
                None => return Err(self.abort()),
                Some(res) => res?,
            };
            if read == 0 {
                return Err(AgencyError::PrematureClose {
                    expected: n,
                    received: filled,
                });
            }
            filled += read;
            self.bytes_received += read as u64;
            tracing::trace!(read, filled, total = n, "read");
        }
        Ok(buf.freeze())
    }

    /// One read of whatever is available. An empty result means EOF.
    pub async fn recv_at_least_1(&mut self) -> Result<Bytes> {
        let stream = self.stream.as_mut().ok_or(AgencyError::Closed)?;
        let read = match guarded(&mut self.cancel, stream.read(&mut self.scratch)).await {
            None => return Err(self.abort()),
            Some(res) => res?,
        };
        self.bytes_received += read as u64;
        tracing::trace!(read, "read");
        Ok(Bytes::copy_from_slice(&self.scratch[..read]))
    }

    /// Shut the connection down. Returns `false` if it was already closed.
    pub async fn close(&mut self) -> bool {
        let Some(mut stream) = self.stream.take() else {
            return false;
        };
        if let Some(Err(e)) = guarded(&mut self.cancel, stream.shutdown()).await {
            tracing::debug!(error = %e, "shutdown failed, dropping connection");
        }
        true
    }
}
