//! Batch framing: `len:u16 | payload`.

use crate::error::{AgencyError, Result};
use crate::protocol::{BetRecord, FRAME_HEADER_LEN, MAX_BATCH_PAYLOAD};
use bytes::{BufMut, Bytes, BytesMut};

/// Prefix `payload` with its big-endian `u16` length.
pub fn frame(payload: &[u8]) -> Result<Bytes> {
    if payload.len() > MAX_BATCH_PAYLOAD {
        return Err(AgencyError::BatchTooLarge {
            len: payload.len(),
            limit: MAX_BATCH_PAYLOAD,
        });
    }
    let mut buf = BytesMut::with_capacity(FRAME_HEADER_LEN + payload.len());
    buf.put_u16(payload.len() as u16);
    buf.put_slice(payload);
    Ok(buf.freeze())
}

/// Inverse of [`frame`]. Only used to verify outgoing frames.
pub fn unframe(framed: &[u8]) -> Result<Bytes> {
    if framed.len() < FRAME_HEADER_LEN {
        return Err(AgencyError::Protocol(format!(
            "frame too short: {} bytes",
            framed.len()
        )));
    }
    let len = u16::from_be_bytes([framed[0], framed[1]]) as usize;
    let body = &framed[FRAME_HEADER_LEN..];
    if body.len() != len {
        return Err(AgencyError::Protocol(format!(
            "frame length mismatch: prefix {} bytes but {} available",
            len,
            body.len()
        )));
    }
    Ok(Bytes::copy_from_slice(body))
}

/// Result of offering a record to a [`BatchBuilder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// The record was appended.
    Added,
    /// The record would overflow the limit; flush and push again.
    Full,
}

/// Packs encoded records into a payload bounded by a byte limit.
#[derive(Debug)]
pub struct BatchBuilder {
    payload: BytesMut,
    limit: usize,
    records: usize,
}

impl BatchBuilder {
    /// `limit` is clamped to what a `u16` prefix can express.
    pub fn new(limit: usize) -> Self {
        let limit = limit.min(MAX_BATCH_PAYLOAD);
        Self {
            payload: BytesMut::with_capacity(limit.min(8 * 1024)),
            limit,
            records: 0,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn is_empty(&self) -> bool {
        self.records == 0
    }

    pub fn record_count(&self) -> usize {
        self.records
    }

    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    /// Encoded size of `record` if it could ever be pushed, without
    /// touching the builder.
    pub fn check(&self, record: &BetRecord) -> Result<usize> {
        record.validate()?;
        let needed = record.encoded_len();
        if needed > self.limit {
            return Err(AgencyError::BatchTooLarge {
                len: needed,
                limit: self.limit,
            });
        }
        Ok(needed)
    }

    /// Encode `record` and append it if it fits.
    ///
    /// A record that can't fit even an empty builder is a
    /// [`AgencyError::BatchTooLarge`]; an invalid record is a
    /// [`AgencyError::FieldTooLong`].
    pub fn push(&mut self, record: &BetRecord) -> Result<PushOutcome> {
        let needed = self.check(record)?;
        if self.payload.len() + needed > self.limit {
            return Ok(PushOutcome::Full);
        }
        record.encode_into(&mut self.payload)?;
        self.records += 1;
        Ok(PushOutcome::Added)
    }

    /// Frame the accumulated payload and reset the builder.
    pub fn finish(&mut self) -> Result<Bytes> {
        let payload = self.payload.split();
        self.records = 0;
        frame(&payload)
    }
}
