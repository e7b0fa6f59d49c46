//! Migration configuration with TOML file support.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use mirror_executor::{BatchExecutor, FixedDelay};
use mirror_replay::LoaderOptions;
use mirror_types::NetworkId;

use crate::MigrateError;

/// Configuration for backup and restore runs.
///
/// Can be loaded from a TOML file via [`MigrateConfig::from_toml_file`] or
/// built programmatically (e.g. for tests). Command-line flags override
/// file values.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MigrateConfig {
    /// Which network the contracts are deployed on.
    #[serde(default = "default_network")]
    pub network: NetworkId,

    /// JSON-RPC endpoint of the ledger service.
    #[serde(default)]
    pub rpc_url: Option<String>,

    /// Where snapshot artifacts and migration reports are written.
    #[serde(default = "default_backup_dir")]
    pub backup_dir: PathBuf,

    /// LMDB directory of the deployment lookup store.
    #[serde(default = "default_store_dir")]
    pub store_dir: PathBuf,

    /// Concurrent reads per chunk.
    #[serde(default = "default_read_concurrency")]
    pub read_concurrency: usize,

    /// Concurrent writes per chunk.
    #[serde(default = "default_write_concurrency")]
    pub write_concurrency: usize,

    /// Addresses per whitelist call.
    #[serde(default = "default_whitelist_chunk")]
    pub whitelist_chunk: usize,

    /// Ledger entries per creation call.
    #[serde(default = "default_ledger_entry_chunk")]
    pub ledger_entry_chunk: usize,

    /// Batches per load call.
    #[serde(default = "default_batch_chunk")]
    pub batch_chunk: usize,

    /// Delay before a failed read chunk is reissued.
    #[serde(default = "default_read_retry_ms")]
    pub read_retry_ms: u64,

    /// Delay before a failed write chunk is reissued.
    #[serde(default = "default_write_retry_ms")]
    pub write_retry_ms: u64,

    /// Pause between replay phases.
    #[serde(default = "default_phase_delay_ms")]
    pub phase_delay_ms: u64,

    /// Read ledger entries one at a time, for targets that cannot serve
    /// concurrent reads reliably.
    #[serde(default)]
    pub serial_reads: bool,

    /// Segments the onchain fingerprint walks.
    #[serde(default = "default_onchain_segments")]
    pub onchain_segments: u32,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_network() -> NetworkId {
    NetworkId::Dev
}

fn default_backup_dir() -> PathBuf {
    PathBuf::from("./backups")
}

fn default_store_dir() -> PathBuf {
    PathBuf::from("./mirror_store")
}

fn default_read_concurrency() -> usize {
    10
}

fn default_write_concurrency() -> usize {
    5
}

fn default_whitelist_chunk() -> usize {
    100
}

fn default_ledger_entry_chunk() -> usize {
    20
}

fn default_batch_chunk() -> usize {
    4
}

fn default_read_retry_ms() -> u64 {
    1_000
}

fn default_write_retry_ms() -> u64 {
    2_000
}

fn default_phase_delay_ms() -> u64 {
    1_000
}

fn default_onchain_segments() -> u32 {
    mirror_fingerprint::DEFAULT_SEGMENTS
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl MigrateConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, MigrateError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| MigrateError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, MigrateError> {
        toml::from_str(s).map_err(|e| MigrateError::Config(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, MigrateError> {
        toml::to_string_pretty(self).map_err(|e| MigrateError::Config(e.to_string()))
    }

    /// The RPC endpoint, required before any remote call.
    pub fn require_rpc_url(&self) -> Result<&str, MigrateError> {
        match self.rpc_url.as_deref() {
            Some(url) if !url.trim().is_empty() => Ok(url),
            _ => Err(MigrateError::InvalidInput(
                "no RPC URL configured (set rpc_url or MIRROR_RPC_URL)".into(),
            )),
        }
    }

    pub fn read_executor(&self) -> BatchExecutor<FixedDelay> {
        BatchExecutor::new(
            self.read_concurrency,
            FixedDelay::from_millis(self.read_retry_ms),
        )
    }

    pub fn write_executor(&self) -> BatchExecutor<FixedDelay> {
        BatchExecutor::new(
            self.write_concurrency,
            FixedDelay::from_millis(self.write_retry_ms),
        )
    }

    pub fn loader_options(&self) -> LoaderOptions {
        LoaderOptions {
            whitelist_chunk: self.whitelist_chunk,
            ledger_entry_chunk: self.ledger_entry_chunk,
            batch_chunk: self.batch_chunk,
            phase_delay: Duration::from_millis(self.phase_delay_ms),
        }
    }
}

impl Default for MigrateConfig {
    fn default() -> Self {
        Self {
            network: default_network(),
            rpc_url: None,
            backup_dir: default_backup_dir(),
            store_dir: default_store_dir(),
            read_concurrency: default_read_concurrency(),
            write_concurrency: default_write_concurrency(),
            whitelist_chunk: default_whitelist_chunk(),
            ledger_entry_chunk: default_ledger_entry_chunk(),
            batch_chunk: default_batch_chunk(),
            read_retry_ms: default_read_retry_ms(),
            write_retry_ms: default_write_retry_ms(),
            phase_delay_ms: default_phase_delay_ms(),
            serial_reads: false,
            onchain_segments: default_onchain_segments(),
            log_format: default_log_format(),
            log_level: default_log_level(),
        }
    }
}
