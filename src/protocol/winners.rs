//! Winner response decoding: `count:u16 | count × id:u32`.
//!
//! The response can arrive split at any byte boundary, so [`WinnerParser`]
//! keeps a growable buffer and a read cursor and only decodes once the bytes
//! it is waiting for are all there.

use crate::error::{AgencyError, Result};
use crate::protocol::{WINNER_COUNT_LEN, WINNER_ID_LEN};
use bytes::BytesMut;

/// Document number of a winning bet.
pub type WinnerId = u32;

/// Decode a complete response given as its two parts.
pub fn parse(count_prefix: &[u8], id_bytes: &[u8]) -> Result<Vec<WinnerId>> {
    if count_prefix.len() != WINNER_COUNT_LEN {
        return Err(AgencyError::Protocol(format!(
            "winner count prefix must be {} bytes, got {}",
            WINNER_COUNT_LEN,
            count_prefix.len()
        )));
    }
    let count = u16::from_be_bytes([count_prefix[0], count_prefix[1]]) as usize;
    let needed = count * WINNER_ID_LEN;
    if id_bytes.len() < needed {
        return Err(AgencyError::Protocol(format!(
            "winner list truncated: {} ids need {} bytes, got {}",
            count,
            needed,
            id_bytes.len()
        )));
    }
    Ok(id_bytes[..needed]
        .chunks_exact(WINNER_ID_LEN)
        .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

/// Incremental winner response decoder.
#[derive(Debug, Default)]
pub struct WinnerParser {
    buf: BytesMut,
    cursor: usize,
    count: Option<usize>,
    winners: Vec<WinnerId>,
}

impl WinnerParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk read from the connection.
    pub fn feed(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
        self.advance();
    }

    fn unread(&self) -> &[u8] {
        &self.buf[self.cursor..]
    }

    fn advance(&mut self) {
        if self.count.is_none() {
            if self.unread().len() < WINNER_COUNT_LEN {
                return;
            }
            let prefix = self.unread();
            let count = u16::from_be_bytes([prefix[0], prefix[1]]) as usize;
            self.cursor += WINNER_COUNT_LEN;
            self.count = Some(count);
            self.winners.reserve(count);
        }

        let Some(count) = self.count else { return };
        while self.winners.len() < count && self.unread().len() >= WINNER_ID_LEN {
            let id = self.unread();
            let id = u32::from_be_bytes([id[0], id[1], id[2], id[3]]);
            self.winners.push(id);
            self.cursor += WINNER_ID_LEN;
        }
    }

    /// Winner count, once the prefix has arrived.
    pub fn expected_count(&self) -> Option<usize> {
        self.count
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.count, Some(count) if self.winners.len() == count)
    }

    /// Bytes still missing before the response is complete.
    ///
    /// Before the prefix arrives this only counts the missing prefix bytes.
    pub fn needed(&self) -> usize {
        match self.count {
            None => WINNER_COUNT_LEN - self.unread().len(),
            Some(count) => ((count - self.winners.len()) * WINNER_ID_LEN)
                .saturating_sub(self.unread().len()),
        }
    }

    /// Bytes received past the end of a complete response.
    pub fn trailing(&self) -> usize {
        if self.is_complete() {
            self.unread().len()
        } else {
            0
        }
    }

    /// Consume the parser once the connection has nothing more to give.
    pub fn finish(self) -> Result<Vec<WinnerId>> {
        match self.count {
            None => Err(AgencyError::Protocol(format!(
                "winner response ended after {} of {} count bytes",
                self.buf.len(),
                WINNER_COUNT_LEN
            ))),
            Some(count) if self.winners.len() < count => Err(AgencyError::Protocol(format!(
                "winner response ended after {} of {} ids",
                self.winners.len(),
                count
            ))),
            Some(_) => Ok(self.winners),
        }
    }
}
