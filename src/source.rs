//! Record sources: where the session pulls its batches from.

use crate::error::{AgencyError, Result};
use crate::protocol::BetRecord;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};

/// Fields per line in the bets file.
pub const FIELDS_PER_RECORD: usize = 5;

/// Pull-style supplier of bet batches.
#[async_trait]
pub trait RecordSource: Send {
    /// Up to `max` records, or `None` once the source is exhausted.
    async fn next_batch(&mut self, max: usize) -> Result<Option<Vec<BetRecord>>>;

    /// Release the underlying resource. Safe to call more than once.
    fn close(&mut self);
}

/// Reads `first,last,document,birthdate,number` lines from a bets file.
pub struct CsvBetReader {
    path: PathBuf,
    agency: String,
    lines: Option<Lines<BufReader<File>>>,
    line_no: usize,
}

impl CsvBetReader {
    pub async fn open(path: impl AsRef<Path>, agency: impl Into<String>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).await.map_err(|e| {
            AgencyError::Source(format!("cannot open {}: {}", path.display(), e))
        })?;
        Ok(Self {
            path,
            agency: agency.into(),
            lines: Some(BufReader::new(file).lines()),
            line_no: 0,
        })
    }

    pub fn is_closed(&self) -> bool {
        self.lines.is_none()
    }
}

/// Split a line on commas. A field wrapped in double quotes may contain
/// commas, and `""` inside it stands for one quote. Quotes spanning
/// several lines are not supported.
fn split_fields(line: &str, line_no: usize) -> Result<Vec<String>> {
    let invalid = |reason: &str| AgencyError::InvalidRecord {
        line: line_no,
        reason: reason.to_string(),
    };

    let mut fields = Vec::with_capacity(FIELDS_PER_RECORD);
    let mut chars = line.chars().peekable();
    loop {
        let mut field = String::new();
        if chars.peek() == Some(&'"') {
            chars.next();
            loop {
                match chars.next() {
                    Some('"') if chars.peek() == Some(&'"') => {
                        chars.next();
                        field.push('"');
                    }
                    Some('"') => break,
                    Some(c) => field.push(c),
                    None => return Err(invalid("unterminated quoted field")),
                }
            }
            match chars.next() {
                None => {
                    fields.push(field);
                    return Ok(fields);
                }
                Some(',') => fields.push(field),
                Some(_) => return Err(invalid("unexpected character after closing quote")),
            }
        } else {
            loop {
                match chars.next() {
                    None => {
                        fields.push(field);
                        return Ok(fields);
                    }
                    Some(',') => break,
                    Some('"') => return Err(invalid("bare quote in unquoted field")),
                    Some(c) => field.push(c),
                }
            }
            fields.push(field);
        }
    }
}

/// Split one bets-file line into a record.
pub fn parse_line(line: &str, line_no: usize, agency: &str) -> Result<BetRecord> {
    let fields = split_fields(line, line_no)?;
    if fields.len() != FIELDS_PER_RECORD {
        return Err(AgencyError::InvalidRecord {
            line: line_no,
            reason: format!(
                "expected {} fields, found {}",
                FIELDS_PER_RECORD,
                fields.len()
            ),
        });
    }
    let [first, last, document, birthdate, number]: [String; FIELDS_PER_RECORD] = fields
        .try_into()
        .map_err(|_| AgencyError::InvalidRecord {
            line: line_no,
            reason: "wrong field count".to_string(),
        })?;
    Ok(BetRecord::new(agency, first, last, document, birthdate, number))
}

#[async_trait]
impl RecordSource for CsvBetReader {
    async fn next_batch(&mut self, max: usize) -> Result<Option<Vec<BetRecord>>> {
        let lines = self
            .lines
            .as_mut()
            .ok_or_else(|| AgencyError::Source("bets file already closed".to_string()))?;

        let mut batch = Vec::with_capacity(max);
        while batch.len() < max {
            let Some(line) = lines.next_line().await? else {
                break;
            };
            self.line_no += 1;
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }
            batch.push(parse_line(line, self.line_no, &self.agency)?);
        }

        if batch.is_empty() {
            Ok(None)
        } else {
            Ok(Some(batch))
        }
    }

    fn close(&mut self) {
        if self.lines.take().is_some() {
            tracing::debug!(path = %self.path.display(), "bets file closed");
        }
    }
}

/// In-memory source, mainly for tests and embedding.
#[derive(Debug, Default)]
pub struct VecSource {
    records: VecDeque<BetRecord>,
    close_calls: usize,
}

impl VecSource {
    pub fn new(records: impl IntoIterator<Item = BetRecord>) -> Self {
        Self {
            records: records.into_iter().collect(),
            close_calls: 0,
        }
    }

    /// How many times `close` ran.
    pub fn close_calls(&self) -> usize {
        self.close_calls
    }
}

#[async_trait]
impl RecordSource for VecSource {
    async fn next_batch(&mut self, max: usize) -> Result<Option<Vec<BetRecord>>> {
        if self.records.is_empty() {
            return Ok(None);
        }
        let n = max.min(self.records.len());
        Ok(Some(self.records.drain(..n).collect()))
    }

    fn close(&mut self) {
        self.close_calls += 1;
    }
}
