//! Bet record encoding.

use crate::error::{AgencyError, Result};
use crate::protocol::MAX_FIELD_LEN;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// One bet, as read from the agency's bets file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BetRecord {
    pub agency: String,
    pub first_name: String,
    pub last_name: String,
    pub document: String,
    pub birthdate: String,
    pub number: String,
}

/// Field names in wire order.
pub const WIRE_FIELDS: [&str; 5] = ["first_name", "last_name", "document", "birthdate", "number"];

impl BetRecord {
    pub fn new(
        agency: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        document: impl Into<String>,
        birthdate: impl Into<String>,
        number: impl Into<String>,
    ) -> Self {
        Self {
            agency: agency.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            document: document.into(),
            birthdate: birthdate.into(),
            number: number.into(),
        }
    }

    fn wire_values(&self) -> [&str; 5] {
        [
            &self.first_name,
            &self.last_name,
            &self.document,
            &self.birthdate,
            &self.number,
        ]
    }

    /// Number of bytes [`encode`](Self::encode) produces.
    pub fn encoded_len(&self) -> usize {
        self.wire_values().iter().map(|v| 1 + v.len()).sum()
    }

    /// Reject any field whose length doesn't fit a `u8` prefix.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in WIRE_FIELDS.into_iter().zip(self.wire_values()) {
            if value.len() > MAX_FIELD_LEN {
                return Err(AgencyError::FieldTooLong {
                    field,
                    len: value.len(),
                });
            }
        }
        Ok(())
    }

    pub fn encode(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode_into(&mut buf)?;
        Ok(buf.freeze())
    }

    /// Append the encoding to `buf`. Nothing is written if validation fails.
    pub fn encode_into(&self, buf: &mut BytesMut) -> Result<()> {
        self.validate()?;
        buf.reserve(self.encoded_len());
        for value in self.wire_values() {
            buf.put_u8(value.len() as u8);
            buf.put_slice(value.as_bytes());
        }
        Ok(())
    }

    /// Decode one record from the front of `buf`.
    ///
    /// The agency isn't on the wire, so the caller supplies it.
    pub fn decode(buf: &mut impl Buf, agency: &str) -> Result<Self> {
        let mut values: [String; 5] = Default::default();
        for (field, slot) in WIRE_FIELDS.iter().zip(values.iter_mut()) {
            if buf.remaining() < 1 {
                return Err(AgencyError::Protocol(format!(
                    "missing length byte for `{field}`"
                )));
            }
            let len = buf.get_u8() as usize;
            if buf.remaining() < len {
                return Err(AgencyError::Protocol(format!(
                    "`{field}` truncated: need {len} bytes, have {}",
                    buf.remaining()
                )));
            }
            let raw = buf.copy_to_bytes(len);
            *slot = String::from_utf8(raw.to_vec())
                .map_err(|_| AgencyError::Protocol(format!("`{field}` is not valid UTF-8")))?;
        }
        let [first_name, last_name, document, birthdate, number] = values;
        Ok(Self {
            agency: agency.to_string(),
            first_name,
            last_name,
            document,
            birthdate,
            number,
        })
    }
}
