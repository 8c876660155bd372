use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::MAX_BLOCK_TRANSACTIONS;

pub const CONFIG_LOG_TARGET: &str = "config";

pub const DEFAULT_BLOCK_STEP: u32 = 1000;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Memory,
    Sled,
    Rocksdb,
}

impl Default for StorageKind {
    fn default() -> Self {
        StorageKind::Sled
    }
}

impl FromStr for StorageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(StorageKind::Memory),
            "sled" => Ok(StorageKind::Sled),
            "rocksdb" => Ok(StorageKind::Rocksdb),
            other => Err(format!("unknown storage `{}`", other)),
        }
    }
}

/// Backoff of a periodic driver: `fast_ms` after progress, `slow_ms` when
/// idle, `error_ms` after a failure.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleConfig {
    pub fast_ms: u64,
    pub slow_ms: u64,
    pub error_ms: u64,
}

impl ScheduleConfig {
    pub const fn new(fast_ms: u64, slow_ms: u64, error_ms: u64) -> Self {
        Self {
            fast_ms,
            slow_ms,
            error_ms,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct EnvironmentConfig {
    pub datadir: Option<String>,
    pub storage: StorageKind,
    pub block_step: u32,
    pub max_block_transactions: usize,
    /// Hex encoded secp256k1 secret of the operator.
    pub operator_key: Option<String>,
    pub block_creation: ScheduleConfig,
    pub root_submission: ScheduleConfig,
    pub deposit_polling: ScheduleConfig,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            datadir: None,
            storage: StorageKind::default(),
            block_step: DEFAULT_BLOCK_STEP,
            max_block_transactions: MAX_BLOCK_TRANSACTIONS,
            operator_key: None,
            block_creation: ScheduleConfig::new(1000, 1000, 1000),
            root_submission: ScheduleConfig::new(1000, 10_000, 10_000),
            deposit_polling: ScheduleConfig::new(50, 1000, 1000),
        }
    }
}

fn sanitize_schedule(name: &str, schedule: &mut ScheduleConfig, default: ScheduleConfig) {
    if schedule.fast_ms == 0 {
        warn!(target: CONFIG_LOG_TARGET, schedule = name, provided = ?schedule.fast_ms, updated = ?default.fast_ms, "Sanitizing invalid fast interval");
        schedule.fast_ms = default.fast_ms;
    }
    if schedule.slow_ms == 0 {
        warn!(target: CONFIG_LOG_TARGET, schedule = name, provided = ?schedule.slow_ms, updated = ?default.slow_ms, "Sanitizing invalid slow interval");
        schedule.slow_ms = default.slow_ms;
    }
    if schedule.error_ms == 0 {
        warn!(target: CONFIG_LOG_TARGET, schedule = name, provided = ?schedule.error_ms, updated = ?default.error_ms, "Sanitizing invalid error interval");
        schedule.error_ms = default.error_ms;
    }
}

impl EnvironmentConfig {
    pub fn sanitize(&mut self) {
        let default = EnvironmentConfig::default();
        if self.block_step == 0 {
            warn!(target: CONFIG_LOG_TARGET, provided = ?self.block_step, updated = ?default.block_step, "Sanitizing invalid block step");
            self.block_step = default.block_step;
        }
        if self.max_block_transactions == 0 || self.max_block_transactions > MAX_BLOCK_TRANSACTIONS {
            warn!(target: CONFIG_LOG_TARGET, provided = ?self.max_block_transactions, updated = ?default.max_block_transactions, "Sanitizing invalid max block transactions");
            self.max_block_transactions = default.max_block_transactions;
        }
        sanitize_schedule("block_creation", &mut self.block_creation, default.block_creation);
        sanitize_schedule("root_submission", &mut self.root_submission, default.root_submission);
        sanitize_schedule("deposit_polling", &mut self.deposit_polling, default.deposit_polling);
    }
}
