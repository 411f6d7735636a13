//! Agency configuration.
//!
//! Values come from three layers, highest priority first: command-line
//! flags (which also read `CLI_*` environment variables), an optional TOML
//! file, and built-in defaults.

use crate::error::{AgencyError, Result};
use crate::protocol::MAX_FRAME_PAYLOAD;
use crate::session::{SessionLimits, DEFAULT_MAX_BATCH_RECORDS};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_SERVER_ADDRESS: &str = "server:12345";
pub const DEFAULT_BETS_FILE: &str = "./agency.csv";
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// One configuration layer. Unset fields fall through to the next layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PartialConfig {
    pub id: Option<String>,
    pub server_address: Option<String>,
    pub max_batch_amount: Option<usize>,
    pub bets_file: Option<PathBuf>,
    pub connect_timeout_secs: Option<u64>,
    pub log_level: Option<String>,
}

impl PartialConfig {
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| AgencyError::Config(format!("invalid TOML: {}", e)))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            AgencyError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&text)
    }

    /// Fill every unset field from `lower`.
    pub fn or(self, lower: PartialConfig) -> PartialConfig {
        PartialConfig {
            id: self.id.or(lower.id),
            server_address: self.server_address.or(lower.server_address),
            max_batch_amount: self.max_batch_amount.or(lower.max_batch_amount),
            bets_file: self.bets_file.or(lower.bets_file),
            connect_timeout_secs: self.connect_timeout_secs.or(lower.connect_timeout_secs),
            log_level: self.log_level.or(lower.log_level),
        }
    }
}

/// Validated configuration for one agency run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgencyConfig {
    pub id: String,
    pub server_address: String,
    pub limits: SessionLimits,
    pub bets_file: PathBuf,
    pub connect_timeout: Duration,
    pub log_level: String,
}

impl AgencyConfig {
    /// Apply defaults and validate.
    pub fn resolve(partial: PartialConfig) -> Result<Self> {
        let id = partial
            .id
            .ok_or_else(|| AgencyError::Config("agency id is required".to_string()))?;
        if id.trim().parse::<u8>().is_err() {
            return Err(AgencyError::Config(format!(
                "agency id `{}` must be a number 0-255",
                id
            )));
        }

        let max_batch_records = partial.max_batch_amount.unwrap_or(DEFAULT_MAX_BATCH_RECORDS);
        if max_batch_records == 0 {
            return Err(AgencyError::Config(
                "max batch amount must be at least 1".to_string(),
            ));
        }

        let server_address = partial
            .server_address
            .unwrap_or_else(|| DEFAULT_SERVER_ADDRESS.to_string());
        if server_address.trim().is_empty() {
            return Err(AgencyError::Config("server address is empty".to_string()));
        }

        let timeout_secs = partial
            .connect_timeout_secs
            .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(AgencyError::Config(
                "connect timeout must be at least 1 second".to_string(),
            ));
        }

        Ok(Self {
            id: id.trim().to_string(),
            server_address,
            limits: SessionLimits {
                max_batch_records,
                max_frame_payload: MAX_FRAME_PAYLOAD,
            },
            bets_file: partial
                .bets_file
                .unwrap_or_else(|| PathBuf::from(DEFAULT_BETS_FILE)),
            connect_timeout: Duration::from_secs(timeout_secs),
            log_level: partial
                .log_level
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
        })
    }
}
