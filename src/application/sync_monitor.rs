//! Submission and signature confirmation for sync swaps and transfers

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::clock::{PollSchedule, Sleeper};
use crate::infrastructure::blockchain::{ChainRpc, ConfirmationLevel, SignedTransaction};
use crate::shared::errors::SubmissionError;
use crate::shared::utils::short_id;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ConfirmationResult {
    Confirmed {
        slot: u64,
        level: ConfirmationLevel,
    },
    /// Landed with an execution error
    Failed {
        reason: String,
        slot: Option<u64>,
    },
    /// Attempts exhausted; the transaction may still land
    TimedOut {
        attempts: u32,
        last_level: Option<ConfirmationLevel>,
    },
}

impl ConfirmationResult {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, ConfirmationResult::Confirmed { .. })
    }
}

pub struct SubmissionMonitor {
    rpc: Arc<dyn ChainRpc>,
    sleeper: Arc<dyn Sleeper>,
    target: ConfirmationLevel,
}

impl SubmissionMonitor {
    pub fn new(rpc: Arc<dyn ChainRpc>, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            rpc,
            sleeper,
            target: ConfirmationLevel::default(),
        }
    }

    pub fn with_target(mut self, target: ConfirmationLevel) -> Self {
        self.target = target;
        self
    }

    /// Send once. Never resubmits.
    pub async fn submit(&self, signed: &SignedTransaction) -> Result<String, SubmissionError> {
        info!("🚀 Submitting transaction {}", short_id(&signed.signature));
        let signature = self.rpc.send_transaction(&signed.transaction).await.map_err(|e| {
            warn!("Submission of {} failed: {}", short_id(&signed.signature), e);
            e
        })?;
        if signature != signed.signature {
            warn!(
                "RPC returned signature {} for locally signed {}",
                short_id(&signature),
                short_id(&signed.signature)
            );
        }
        Ok(signature)
    }

    /// Poll until the target level, an execution error, or attempts run out
    pub async fn monitor_sync(&self, signature: &str, schedule: PollSchedule) -> ConfirmationResult {
        let mut last_level = None;

        for attempt in 1..=schedule.max_attempts {
            match self.rpc.signature_status(signature).await {
                Ok(Some(status)) => {
                    if let Some(reason) = status.err {
                        warn!("❌ Transaction {} failed at slot {}: {}", short_id(signature), status.slot, reason);
                        return ConfirmationResult::Failed {
                            reason,
                            slot: Some(status.slot),
                        };
                    }
                    last_level = Some(status.confirmation);
                    if status.confirmation >= self.target {
                        info!(
                            "✅ Transaction {} {} at slot {} (attempt {})",
                            short_id(signature),
                            status.confirmation,
                            status.slot,
                            attempt
                        );
                        return ConfirmationResult::Confirmed {
                            slot: status.slot,
                            level: status.confirmation,
                        };
                    }
                    debug!("Transaction {} at {} (attempt {})", short_id(signature), status.confirmation, attempt);
                }
                Ok(None) => debug!("Transaction {} not yet visible (attempt {})", short_id(signature), attempt),
                Err(e) => warn!("Status poll {} for {} failed: {}", attempt, short_id(signature), e),
            }

            if attempt < schedule.max_attempts {
                self.sleeper.sleep(schedule.interval).await;
            }
        }

        warn!(
            "⏳ Transaction {} unconfirmed after {} attempts",
            short_id(signature),
            schedule.max_attempts
        );
        ConfirmationResult::TimedOut {
            attempts: schedule.max_attempts,
            last_level,
        }
    }
}
