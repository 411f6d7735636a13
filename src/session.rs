//! Upload session: batches → end-marker → winner query.
//!
//! One session per agency, one stage at a time:
//!
//! ```text
//! Connected ─send frame─▶ Uploading ─ack─▶ AwaitingAck ─┐
//!     │                       ▲                         │ more frames
//!     │                       └─────────────────────────┘
//!     └──────── source exhausted ──▶ SentEnd ─request─▶ QueryingWinners ─▶ Done
//!
//! any failure or cancellation ─▶ Failed
//! ```

use crate::error::{AgencyError, Result};
use crate::protocol::{
    Ack, BatchBuilder, PushOutcome, WinnerId, WinnerParser, ACK_LEN, END_MARKER,
    MAX_FRAME_PAYLOAD,
};
use crate::report::SessionReporter;
use crate::source::RecordSource;
use crate::transport::Transport;
use tokio::io::{AsyncRead, AsyncWrite};

/// Default number of records pulled from the source per batch.
pub const DEFAULT_MAX_BATCH_RECORDS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connected,
    Uploading,
    AwaitingAck,
    SentEnd,
    QueryingWinners,
    Done,
    Failed,
}

/// Bounds applied while batching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionLimits {
    /// Records requested from the source per batch.
    pub max_batch_records: usize,

    /// Payload bytes per frame. Batches that encode larger are split.
    pub max_frame_payload: usize,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            max_batch_records: DEFAULT_MAX_BATCH_RECORDS,
            max_frame_payload: MAX_FRAME_PAYLOAD,
        }
    }
}

/// What a finished session did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadSummary {
    /// Batches pulled from the source.
    pub batches: usize,
    /// Frames written (a batch may span several).
    pub frames: usize,
    pub records: usize,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    /// Frames the aggregator acked with an error.
    pub rejected_frames: usize,
    pub winners: Vec<WinnerId>,
}

/// Drives one agency's exchange with the aggregator.
pub struct UploadSession<'r, S> {
    agency: String,
    agency_code: u8,
    transport: Transport<S>,
    limits: SessionLimits,
    reporter: &'r dyn SessionReporter,
    state: SessionState,
    released: bool,
    summary: UploadSummary,
}

fn tag(batch: usize, record: usize) -> impl FnOnce(AgencyError) -> AgencyError {
    move |source| AgencyError::Batch {
        batch,
        record,
        source: Box::new(source),
    }
}

impl<'r, S> UploadSession<'r, S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// `agency` must be a number that fits the one-byte winner request.
    pub fn new(
        agency: impl Into<String>,
        transport: Transport<S>,
        limits: SessionLimits,
        reporter: &'r dyn SessionReporter,
    ) -> Result<Self> {
        let agency = agency.into();
        let agency_code = agency.trim().parse::<u8>().map_err(|_| {
            AgencyError::Config(format!("agency id `{}` must be a number 0-255", agency))
        })?;
        if limits.max_batch_records == 0 {
            return Err(AgencyError::Config(
                "max batch records must be at least 1".to_string(),
            ));
        }
        if limits.max_frame_payload > MAX_FRAME_PAYLOAD {
            return Err(AgencyError::Config(format!(
                "frame payload limit {} exceeds {}",
                limits.max_frame_payload, MAX_FRAME_PAYLOAD
            )));
        }
        Ok(Self {
            agency,
            agency_code,
            transport,
            limits,
            reporter,
            state: SessionState::Connected,
            released: false,
            summary: UploadSummary::default(),
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn set_state(&mut self, next: SessionState) {
        tracing::debug!(agency = %self.agency, from = ?self.state, to = ?next, "session state");
        self.state = next;
    }

    /// Run the whole exchange, then release the transport and the source.
    ///
    /// A session runs once. Calling `run` again after it finished returns
    /// [`AgencyError::Closed`] without touching the connection.
    pub async fn run<R>(&mut self, source: &mut R) -> Result<UploadSummary>
    where
        R: RecordSource + ?Sized,
    {
        if self.state != SessionState::Connected {
            return Err(AgencyError::Closed);
        }

        let result = self.drive(source).await;
        if let Err(e) = &result {
            self.set_state(SessionState::Failed);
            self.reporter.session_failed(&self.agency, e);
        }
        self.release(source).await;
        result
    }

    async fn drive<R>(&mut self, source: &mut R) -> Result<UploadSummary>
    where
        R: RecordSource + ?Sized,
    {
        self.upload(source).await?;
        self.send_end().await?;
        let winners = self.query_winners().await?;

        self.summary.bytes_sent = self.transport.bytes_sent();
        self.summary.bytes_received = self.transport.bytes_received();
        self.summary.winners = winners;
        self.set_state(SessionState::Done);
        Ok(self.summary.clone())
    }

    async fn upload<R>(&mut self, source: &mut R) -> Result<()>
    where
        R: RecordSource + ?Sized,
    {
        let mut builder = BatchBuilder::new(self.limits.max_frame_payload);
        while let Some(batch) = source.next_batch(self.limits.max_batch_records).await? {
            self.summary.batches += 1;
            let batch_no = self.summary.batches;
            // A batch that would be split must not go out half-sent.
            for (i, record) in batch.iter().enumerate() {
                builder.check(record).map_err(tag(batch_no, i + 1))?;
            }
            for (i, record) in batch.iter().enumerate() {
                loop {
                    match builder.push(record).map_err(tag(batch_no, i + 1))? {
                        PushOutcome::Added => break,
                        PushOutcome::Full => self.send_frame(&mut builder, batch_no).await?,
                    }
                }
            }
            if !builder.is_empty() {
                self.send_frame(&mut builder, batch_no).await?;
            }
        }
        Ok(())
    }

    async fn send_frame(&mut self, builder: &mut BatchBuilder, batch_no: usize) -> Result<()> {
        let records = builder.record_count();
        let frame = builder.finish().map_err(tag(batch_no, records))?;

        self.set_state(SessionState::Uploading);
        if let Err(e) = self.transport.send_all(&frame).await {
            self.reporter
                .batch_failed(&self.agency, self.summary.frames + 1, frame.len(), &e);
            return Err(e);
        }

        self.set_state(SessionState::AwaitingAck);
        let ack = match self.transport.recv_exact(ACK_LEN).await {
            Ok(ack) => Ack::from_u8(ack[0]),
            Err(e) => {
                self.reporter
                    .batch_failed(&self.agency, self.summary.frames + 1, frame.len(), &e);
                return Err(e);
            }
        };

        self.summary.frames += 1;
        self.summary.records += records;
        if ack.is_rejected() {
            self.summary.rejected_frames += 1;
        }
        self.reporter
            .batch_sent(&self.agency, self.summary.frames, frame.len(), records, ack);
        Ok(())
    }

    async fn send_end(&mut self) -> Result<()> {
        self.transport.send_all(&[END_MARKER]).await?;
        self.set_state(SessionState::SentEnd);
        self.reporter.end_sent(&self.agency, self.summary.frames);
        Ok(())
    }

    async fn query_winners(&mut self) -> Result<Vec<WinnerId>> {
        self.transport.send_all(&[self.agency_code]).await?;
        self.set_state(SessionState::QueryingWinners);

        let mut parser = WinnerParser::new();
        while !parser.is_complete() {
            let chunk = self.transport.recv_at_least_1().await?;
            if chunk.is_empty() {
                break;
            }
            parser.feed(&chunk);
        }
        if parser.trailing() > 0 {
            tracing::warn!(
                agency = %self.agency,
                bytes = parser.trailing(),
                "discarding bytes after winner response"
            );
        }

        let winners = parser.finish()?;
        self.reporter.winners_received(&self.agency, &winners);
        Ok(winners)
    }

    /// Close the transport and the source. Only the first call does anything.
    pub async fn release<R>(&mut self, source: &mut R)
    where
        R: RecordSource + ?Sized,
    {
        if self.released {
            return;
        }
        self.released = true;
        source.close();
        if self.transport.close().await {
            self.reporter.connection_closed(&self.agency);
        }
    }
}
