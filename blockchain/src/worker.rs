use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use types::config::ScheduleConfig;

use crate::BLOCKCHAIN_LOG_TARGET;

/// Outcome of one tick of a periodic task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Work was done, more may be waiting.
    Advanced,
    Idle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    pub fast: Duration,
    pub slow: Duration,
    pub error: Duration,
}

impl Schedule {
    pub fn delay(&self, outcome: &Result<Progress>) -> Duration {
        match outcome {
            Ok(Progress::Advanced) => self.fast,
            Ok(Progress::Idle) => self.slow,
            Err(_) => self.error,
        }
    }
}

impl From<ScheduleConfig> for Schedule {
    fn from(conf: ScheduleConfig) -> Self {
        Self {
            fast: Duration::from_millis(conf.fast_ms),
            slow: Duration::from_millis(conf.slow_ms),
            error: Duration::from_millis(conf.error_ms),
        }
    }
}

#[async_trait]
pub trait PeriodicTask: Send + Sync {
    fn name(&self) -> &'static str;

    async fn tick(&self) -> Result<Progress>;
}

/// Runs `task` until `shutdown` flips to true or its sender is dropped.
/// Ticks never overlap; failures are logged and retried after `schedule.error`.
pub async fn run_periodic(
    task: Arc<dyn PeriodicTask>,
    schedule: Schedule,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        if *shutdown.borrow() {
            break;
        }
        let outcome = task.tick().await;
        if let Err(error) = &outcome {
            warn!(target: BLOCKCHAIN_LOG_TARGET, task = task.name(), error = %error, "Periodic task failed");
        }
        let delay = schedule.delay(&outcome);
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
    debug!(target: BLOCKCHAIN_LOG_TARGET, task = task.name(), "Periodic task stopped");
}

pub fn spawn_periodic(
    task: Arc<dyn PeriodicTask>,
    schedule: Schedule,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(run_periodic(task, schedule, shutdown))
}
