//! Agency ⇄ aggregator wire protocol.
//!
//! Wire format: all multi-byte integers are big-endian.
//!
//! ```text
//! record   = 5 × ( len:u8 | utf8 bytes )     first, last, document, birthdate, number
//! frame    = len:u16 | record*               one or more records
//! ack      = u8                              one per frame (1 = ok, 0 = error)
//! end      = 'E'                             sent once after the last frame
//! request  = agency:u8                       winner query
//! response = count:u16 | count × id:u32
//! ```
//!
//! The end-marker shares the first byte position with a frame's length
//! prefix, so frame payloads are capped below `END_MARKER << 8`.

pub mod batch;
pub mod record;
pub mod winners;

pub use batch::{frame, unframe, BatchBuilder, PushOutcome};
pub use record::BetRecord;
pub use winners::{parse, WinnerId, WinnerParser};

/// Largest value a one-byte field length can carry.
pub const MAX_FIELD_LEN: usize = u8::MAX as usize;

/// Largest payload a two-byte frame length can carry.
pub const MAX_BATCH_PAYLOAD: usize = u16::MAX as usize;

/// Size of the frame length prefix.
pub const FRAME_HEADER_LEN: usize = 2;

/// Size of an ack.
pub const ACK_LEN: usize = 1;

/// Sentinel sent once after the last frame.
pub const END_MARKER: u8 = b'E';

/// Largest payload whose length prefix can't start with [`END_MARKER`].
pub const MAX_FRAME_PAYLOAD: usize = ((END_MARKER as usize) << 8) - 1;

/// Size of the winner count prefix.
pub const WINNER_COUNT_LEN: usize = 2;

/// Size of one winner id.
pub const WINNER_ID_LEN: usize = 4;

/// Ack value the aggregator sends for a stored batch.
pub const ACK_OK: u8 = 1;

/// Ack value the aggregator sends for a batch it could not parse.
pub const ACK_ERROR: u8 = 0;

/// Decoded per-frame acknowledgement.
///
/// Any value counts as "received"; the distinction only feeds reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    Accepted,
    Rejected,
    Other(u8),
}

impl Ack {
    pub fn from_u8(b: u8) -> Self {
        match b {
            ACK_OK => Self::Accepted,
            ACK_ERROR => Self::Rejected,
            other => Self::Other(other),
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Ack::Rejected)
    }
}
