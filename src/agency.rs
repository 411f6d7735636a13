//! Wires configuration, connection, bets file and session together.

use crate::config::AgencyConfig;
use crate::error::Result;
use crate::report::SessionReporter;
use crate::session::{UploadSession, UploadSummary};
use crate::source::{CsvBetReader, RecordSource};
use crate::transport::{CancelToken, Transport};

/// Run one agency end to end against the configured aggregator.
pub async fn run_agency(
    config: &AgencyConfig,
    cancel: CancelToken,
    reporter: &dyn SessionReporter,
) -> Result<UploadSummary> {
    let mut transport =
        match Transport::connect(&config.server_address, config.connect_timeout, cancel).await {
            Ok(transport) => transport,
            Err(e) => {
                reporter.session_failed(&config.id, &e);
                return Err(e);
            }
        };

    let mut source = match CsvBetReader::open(&config.bets_file, config.id.clone()).await {
        Ok(source) => source,
        Err(e) => {
            reporter.session_failed(&config.id, &e);
            if transport.close().await {
                reporter.connection_closed(&config.id);
            }
            return Err(e);
        }
    };

    let mut session = match UploadSession::new(
        config.id.clone(),
        transport,
        config.limits.clone(),
        reporter,
    ) {
        Ok(session) => session,
        Err(e) => {
            // The transport moved into `new` and was dropped with it.
            reporter.session_failed(&config.id, &e);
            source.close();
            reporter.connection_closed(&config.id);
            return Err(e);
        }
    };
    session.run(&mut source).await
}
