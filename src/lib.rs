//! Lottery agency client.
//!
//! Uploads an agency's bets to the central aggregator in length-prefixed
//! batches, signals the end of the upload, then asks for the agency's
//! winners.
//!
//! ```text
//! CsvBetReader ─batch─▶ UploadSession ─frame─▶ Transport ─▶ aggregator
//!                              ▲                   │
//!                              └── ack / winners ◀─┘
//! ```

pub mod agency;
pub mod cli;
pub mod config;
pub mod error;
pub mod protocol;
pub mod report;
pub mod session;
pub mod source;
pub mod transport;

pub use agency::run_agency;
pub use config::{AgencyConfig, PartialConfig};
pub use error::{AgencyError, Result};
pub use protocol::{BetRecord, WinnerId};
pub use report::{SessionReporter, TracingReporter};
pub use session::{SessionLimits, SessionState, UploadSession, UploadSummary};
pub use source::{CsvBetReader, RecordSource, VecSource};
pub use transport::{cancel_pair, CancelHandle, CancelToken, Transport};
