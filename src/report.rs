//! Session reporting.
//!
//! The session calls these hooks as it moves through the protocol. The
//! default implementation writes `tracing` events in the
//! `action: <name> | result: <outcome> | key: value` style the aggregator
//! logs use, so both sides of a run can be grepped the same way.

use crate::error::AgencyError;
use crate::protocol::{Ack, WinnerId};

/// Progress hooks invoked by [`UploadSession`](crate::session::UploadSession).
pub trait SessionReporter: Send + Sync {
    fn batch_sent(&self, agency: &str, batch: usize, bytes: usize, records: usize, ack: Ack);
    fn batch_failed(&self, agency: &str, batch: usize, bytes: usize, error: &AgencyError);
    fn end_sent(&self, agency: &str, frames: usize);
    fn winners_received(&self, agency: &str, winners: &[WinnerId]);
    fn session_failed(&self, agency: &str, error: &AgencyError);
    fn connection_closed(&self, agency: &str);
}

/// Reports through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl SessionReporter for TracingReporter {
    fn batch_sent(&self, agency: &str, batch: usize, bytes: usize, records: usize, ack: Ack) {
        if ack.is_rejected() {
            tracing::warn!(
                "action: apuestas_enviadas | result: rejected | agency_id: {} | bytes: {} | batch: {} | records: {}",
                agency,
                bytes,
                batch,
                records
            );
        } else {
            tracing::info!(
                "action: apuestas_enviadas | result: success | agency_id: {} | bytes: {} | batch: {} | records: {}",
                agency,
                bytes,
                batch,
                records
            );
        }
    }

    fn batch_failed(&self, agency: &str, batch: usize, bytes: usize, error: &AgencyError) {
        tracing::error!(
            "action: apuestas_enviadas | result: fail | agency_id: {} | bytes: {} | batch: {} | error: {}",
            agency,
            bytes,
            batch,
            error
        );
    }

    fn end_sent(&self, agency: &str, frames: usize) {
        tracing::info!(
            "action: fin_apuestas | result: success | agency_id: {} | batches: {}",
            agency,
            frames
        );
    }

    fn winners_received(&self, agency: &str, winners: &[WinnerId]) {
        tracing::info!(
            "action: consulta_ganadores | result: success | agency_id: {} | cant_ganadores: {}",
            agency,
            winners.len()
        );
    }

    fn session_failed(&self, agency: &str, error: &AgencyError) {
        if error.is_cancelled() {
            tracing::info!(
                "action: close_client | result: cancelled | agency_id: {}",
                agency
            );
        } else {
            tracing::error!(
                "action: session | result: fail | agency_id: {} | kind: {} | error: {}",
                agency,
                error.kind(),
                error
            );
        }
    }

    fn connection_closed(&self, agency: &str) {
        tracing::info!(
            "action: close_connection | result: success | agency_id: {}",
            agency
        );
    }
}
