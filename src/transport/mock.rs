//! Scripted in-memory stream for transport and session tests.

use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

#[derive(Debug)]
enum ReadStep {
    Data(Vec<u8>),
    Eof,
    Error(io::ErrorKind),
    Hang,
}

#[derive(Debug, Default)]
struct Shared {
    written: Mutex<Vec<u8>>,
    io_calls: AtomicUsize,
    shutdowns: AtomicUsize,
    dropped: AtomicBool,
}

/// Inspects a [`MockStream`] after it has been moved into a transport.
#[derive(Debug, Clone)]
pub(crate) struct MockHandle {
    shared: Arc<Shared>,
}

impl MockHandle {
    pub fn written(&self) -> Vec<u8> {
        self.shared.written.lock().unwrap().clone()
    }

    pub fn io_calls(&self) -> usize {
        self.shared.io_calls.load(Ordering::SeqCst)
    }

    pub fn shutdowns(&self) -> usize {
        self.shared.shutdowns.load(Ordering::SeqCst)
    }

    pub fn is_dropped(&self) -> bool {
        self.shared.dropped.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
pub(crate) struct MockBuilder {
    reads: VecDeque<ReadStep>,
    max_write: Option<usize>,
    write_capacity: Option<usize>,
    write_error: Option<io::ErrorKind>,
}

impl MockBuilder {
    /// Queue one read that returns `data` (or as much as fits).
    pub fn read(mut self, data: &[u8]) -> Self {
        self.reads.push_back(ReadStep::Data(data.to_vec()));
        self
    }

    /// Queue `data` as a series of reads of at most `chunk` bytes.
    pub fn read_chunked(mut self, data: &[u8], chunk: usize) -> Self {
        for c in data.chunks(chunk) {
            self.reads.push_back(ReadStep::Data(c.to_vec()));
        }
        self
    }

    pub fn eof(mut self) -> Self {
        self.reads.push_back(ReadStep::Eof);
        self
    }

    pub fn read_error(mut self, kind: io::ErrorKind) -> Self {
        self.reads.push_back(ReadStep::Error(kind));
        self
    }

    /// Once the queue reaches this point, reads never complete.
    pub fn hang_reads(mut self) -> Self {
        self.reads.push_back(ReadStep::Hang);
        self
    }

    /// Accept at most `n` bytes per write call.
    pub fn max_write(mut self, n: usize) -> Self {
        self.max_write = Some(n);
        self
    }

    /// Accept `n` bytes in total, then report writes of zero bytes.
    pub fn write_capacity(mut self, n: usize) -> Self {
        self.write_capacity = Some(n);
        self
    }

    /// Fail every write with `kind`.
    pub fn write_error(mut self, kind: io::ErrorKind) -> Self {
        self.write_error = Some(kind);
        self
    }

    pub fn build(self) -> (MockStream, MockHandle) {
        let shared = Arc::new(Shared::default());
        let stream = MockStream {
            reads: self.reads,
            max_write: self.max_write,
            write_capacity: self.write_capacity,
            write_error: self.write_error,
            shared: shared.clone(),
        };
        (stream, MockHandle { shared })
    }
}

#[derive(Debug)]
pub(crate) struct MockStream {
    reads: VecDeque<ReadStep>,
    max_write: Option<usize>,
    write_capacity: Option<usize>,
    write_error: Option<io::ErrorKind>,
    shared: Arc<Shared>,
}

impl MockStream {
    pub fn builder() -> MockBuilder {
        MockBuilder::default()
    }
}

impl Drop for MockStream {
    fn drop(&mut self) {
        self.shared.dropped.store(true, Ordering::SeqCst);
    }
}

impl AsyncRead for MockStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        self.shared.io_calls.fetch_add(1, Ordering::SeqCst);
        match self.reads.pop_front() {
            None | Some(ReadStep::Eof) => Poll::Ready(Ok(())),
            Some(ReadStep::Error(kind)) => Poll::Ready(Err(io::Error::from(kind))),
            Some(ReadStep::Hang) => {
                self.reads.push_front(ReadStep::Hang);
                Poll::Pending
            }
            Some(ReadStep::Data(mut data)) => {
                let n = data.len().min(buf.remaining());
                buf.put_slice(&data[..n]);
                if n < data.len() {
                    let rest = data.split_off(n);
                    self.reads.push_front(ReadStep::Data(rest));
                }
                Poll::Ready(Ok(()))
            }
        }
    }
}

impl AsyncWrite for MockStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.shared.io_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(kind) = self.write_error {
            return Poll::Ready(Err(io::Error::from(kind)));
        }
        let mut n = buf.len();
        if let Some(max) = self.max_write {
            n = n.min(max);
        }
        if let Some(capacity) = self.write_capacity.as_mut() {
            n = n.min(*capacity);
            *capacity -= n;
        }
        self.shared.written.lock().unwrap().extend_from_slice(&buf[..n]);
        Poll::Ready(Ok(n))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.shared.shutdowns.fetch_add(1, Ordering::SeqCst);
        Poll::Ready(Ok(()))
    }
}
