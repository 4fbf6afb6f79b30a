//! Intent order tracking over `/order-status`

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::clock::{PollSchedule, Sleeper};
use crate::domain::execution::{Fill, IntentStatus, Order, OrderPhase};
use crate::domain::quote::ExecutionMode;
use crate::exchanges::QuoteApiClient;
use crate::shared::errors::OrderError;
use crate::shared::utils::short_id;

/// State handed to the update callback after each successful poll
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderSnapshot {
    pub attempt: u32,
    pub status: IntentStatus,
    pub fills: usize,
    pub total_in: u64,
    pub total_out: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FinalOrderState {
    /// Last accepted lifecycle status
    pub status: IntentStatus,
    pub fills: Vec<Fill>,
    pub total_in: u64,
    pub total_out: u64,
    pub attempts: u32,
    /// Attempts ran out before a terminal status
    pub timed_out: bool,
}

impl FinalOrderState {
    pub fn is_closed(&self) -> bool {
        !self.timed_out && self.status == IntentStatus::Closed
    }
}

fn current_status(order: &Order) -> IntentStatus {
    match order.phase() {
        OrderPhase::Intent(status) => status,
        _ => IntentStatus::Open,
    }
}

pub struct AsyncOrderMonitor {
    api: Arc<dyn QuoteApiClient>,
    sleeper: Arc<dyn Sleeper>,
}

impl AsyncOrderMonitor {
    pub fn new(api: Arc<dyn QuoteApiClient>, sleeper: Arc<dyn Sleeper>) -> Self {
        Self { api, sleeper }
    }

    /// Track an intent known only by its signature
    pub async fn monitor_async<F>(
        &self,
        signature: &str,
        requested_in: u64,
        schedule: PollSchedule,
        on_update: F,
    ) -> Result<FinalOrderState, OrderError>
    where
        F: FnMut(&OrderSnapshot) + Send,
    {
        let mut order = Order::new();
        order.mark_quoted(ExecutionMode::Async, requested_in)?;
        order.mark_signed(signature)?;
        order.mark_submitted(None)?;
        Ok(self.monitor_order(&mut order, signature, schedule, on_update).await)
    }

    /// Poll until a terminal status or attempts run out, folding every poll
    /// into `order`. Fills merge before the status so a closing poll's fills count.
    pub async fn monitor_order<F>(
        &self,
        order: &mut Order,
        signature: &str,
        schedule: PollSchedule,
        mut on_update: F,
    ) -> FinalOrderState
    where
        F: FnMut(&OrderSnapshot) + Send,
    {
        let mut attempts = 0;

        for attempt in 1..=schedule.max_attempts {
            attempts = attempt;
            match self.api.order_status(signature).await {
                Ok(snapshot) => {
                    match order.merge_fills(snapshot.fills) {
                        Ok(report) => {
                            for rejected in &report.rejected {
                                warn!("Rejected fill for {}: {}", short_id(signature), rejected);
                            }
                            if report.added > 0 {
                                debug!("{} new fill(s) for {}", report.added, short_id(signature));
                            }
                        }
                        Err(e) => warn!("Cannot record fills for {}: {}", short_id(signature), e),
                    }

                    match snapshot.status {
                        Some(status) => {
                            if let Err(e) = order.observe_intent(status) {
                                warn!("Ignoring status from poll {} for {}: {}", attempt, short_id(signature), e);
                            }
                        }
                        None => warn!("Unrecognized status '{}' for {}", snapshot.raw_status, short_id(signature)),
                    }

                    let status = current_status(order);
                    on_update(&OrderSnapshot {
                        attempt,
                        status,
                        fills: order.ledger().fills().len(),
                        total_in: order.ledger().total_in(),
                        total_out: order.ledger().total_out(),
                    });

                    if status.is_terminal() {
                        info!("📦 Intent {} reached {} after {} poll(s)", short_id(signature), status, attempt);
                        return Self::final_state(order, attempts, false);
                    }
                }
                Err(e) => warn!("Order status poll {} for {} failed: {}", attempt, short_id(signature), e),
            }

            if attempt < schedule.max_attempts {
                self.sleeper.sleep(schedule.interval).await;
            }
        }

        warn!(
            "⏳ Intent {} still {} after {} poll(s)",
            short_id(signature),
            current_status(order),
            attempts
        );
        Self::final_state(order, attempts, true)
    }

    fn final_state(order: &Order, attempts: u32, timed_out: bool) -> FinalOrderState {
        FinalOrderState {
            status: current_status(order),
            fills: order.ledger().fills().to_vec(),
            total_in: order.ledger().total_in(),
            total_out: order.ledger().total_out(),
            attempts,
            timed_out,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::{intent_status, MockTradeApi, RecordingSleeper};
    use crate::shared::errors::ApiError;
    use std::time::Duration;

    fn setup() -> (Arc<MockTradeApi>, Arc<RecordingSleeper>, AsyncOrderMonitor) {
        let api = Arc::new(MockTradeApi::new(0, ExecutionMode::Async, None));
        let sleeper = Arc::new(RecordingSleeper::default());
        let monitor = AsyncOrderMonitor::new(api.clone(), sleeper.clone());
        (api, sleeper, monitor)
    }

    fn schedule(max_attempts: u32) -> PollSchedule {
        PollSchedule::new(Duration::from_secs(2), max_attempts)
    }

    #[tokio::test]
    async fn test_fills_accumulate_to_close() {
        let (api, sleeper, monitor) = setup();
        api.script_statuses(vec![
            intent_status(IntentStatus::Open, vec![]),
            intent_status(IntentStatus::Open, vec![Fill::new("f1", 4_000_000, 3_800_000)]),
            intent_status(
                IntentStatus::PendingClose,
                vec![Fill::new("f1", 4_000_000, 3_800_000), Fill::new("f2", 6_000_000, 5_700_000)],
            ),
            intent_status(
                IntentStatus::Closed,
                vec![Fill::new("f1", 4_000_000, 3_800_000), Fill::new("f2", 6_000_000, 5_700_000)],
            ),
        ]);

        let mut updates = Vec::new();
        let state = monitor
            .monitor_async("sig", 10_000_000, schedule(10), |s| updates.push(s.clone()))
            .await
            .unwrap();

        assert!(state.is_closed());
        assert_eq!(state.total_in, 10_000_000);
        assert_eq!(state.total_out, 9_500_000);
        assert_eq!(state.fills.len(), 2);
        assert_eq!(state.attempts, 4);
        assert_eq!(updates.len(), 4);
        assert_eq!(updates[1].fills, 1);
        assert_eq!(sleeper.count(), 3);
    }

    #[tokio::test]
    async fn test_timeout_returns_last_known_state() {
        let (api, _sleeper, monitor) = setup();
        api.script_statuses(vec![intent_status(
            IntentStatus::Open,
            vec![Fill::new("f1", 1_000_000, 950_000)],
        )]);

        let state = monitor.monitor_async("sig", 10_000_000, schedule(3), |_| {}).await.unwrap();
        assert!(state.timed_out);
        assert!(!state.is_closed());
        assert_eq!(state.status, IntentStatus::Open);
        assert_eq!(state.total_out, 950_000);
        assert_eq!(state.attempts, 3);
    }

    #[tokio::test]
    async fn test_failure_status_is_terminal() {
        let (api, _sleeper, monitor) = setup();
        api.script_statuses(vec![
            intent_status(IntentStatus::Open, vec![]),
            intent_status(IntentStatus::OpenExpired, vec![]),
        ]);
        let state = monitor.monitor_async("sig", 1_000, schedule(10), |_| {}).await.unwrap();
        assert!(!state.timed_out);
        assert_eq!(state.status, IntentStatus::OpenExpired);
        assert_eq!(state.attempts, 2);
    }

    #[tokio::test]
    async fn test_illegal_transition_and_over_fill_are_ignored() {
        let (api, _sleeper, monitor) = setup();
        api.script_statuses(vec![
            intent_status(IntentStatus::PendingClose, vec![Fill::new("big", 2_000, 1_900)]),
            // pendingClose -> openFailed is not a legal step
            intent_status(IntentStatus::OpenFailed, vec![Fill::new("ok", 1_000, 990)]),
            Err(ApiError::Transport("reset".to_string())),
            intent_status(IntentStatus::Closed, vec![Fill::new("ok", 1_000, 990)]),
        ]);

        let state = monitor.monitor_async("sig", 1_000, schedule(10), |_| {}).await.unwrap();
        assert!(state.is_closed());
        assert_eq!(state.total_in, 1_000);
        assert_eq!(state.fills.len(), 1);
        assert_eq!(state.fills[0].signature, "ok");
        assert_eq!(state.attempts, 4);
    }
}
