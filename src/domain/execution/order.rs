//! Order lifecycle and fill accounting

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use uuid::Uuid;

use crate::domain::quote::ExecutionMode;
use crate::shared::errors::OrderError;
use crate::shared::utils;

/// Lifecycle of an async (intent) order as reported by the order-status endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IntentStatus {
    Open,
    PendingClose,
    Closed,
    OpenExpired,
    OpenFailed,
}

impl IntentStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "open" => Some(IntentStatus::Open),
            "pendingClose" => Some(IntentStatus::PendingClose),
            "closed" => Some(IntentStatus::Closed),
            "openExpired" => Some(IntentStatus::OpenExpired),
            "openFailed" => Some(IntentStatus::OpenFailed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IntentStatus::Open => "open",
            IntentStatus::PendingClose => "pendingClose",
            IntentStatus::Closed => "closed",
            IntentStatus::OpenExpired => "openExpired",
            IntentStatus::OpenFailed => "openFailed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, IntentStatus::Closed | IntentStatus::OpenExpired | IntentStatus::OpenFailed)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, IntentStatus::OpenExpired | IntentStatus::OpenFailed)
    }

    /// Single-step transition table
    pub fn can_transition_to(&self, next: IntentStatus) -> bool {
        use IntentStatus::*;
        match self {
            Open => matches!(next, Open | PendingClose | OpenExpired | OpenFailed),
            PendingClose => matches!(next, PendingClose | Closed),
            Closed | OpenExpired | OpenFailed => false,
        }
    }

    /// Whether `next` is reachable through one or more legal steps.
    /// Polls sample the lifecycle, so `open -> closed` can be observed
    /// directly when `pendingClose` fell between two polls.
    pub fn can_advance_to(&self, next: IntentStatus) -> bool {
        if self.can_transition_to(next) {
            return true;
        }
        match self {
            IntentStatus::Open => next == IntentStatus::Closed,
            _ => false,
        }
    }
}

impl fmt::Display for IntentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Phase of an [`Order`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "phase", content = "status")]
pub enum OrderPhase {
    Created,
    Quoted,
    Signed,
    Submitted,
    Confirmed,
    Failed,
    Intent(IntentStatus),
}

impl OrderPhase {
    pub fn is_terminal(&self) -> bool {
        match self {
            OrderPhase::Confirmed | OrderPhase::Failed => true,
            OrderPhase::Intent(status) => status.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for OrderPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderPhase::Created => f.write_str("created"),
            OrderPhase::Quoted => f.write_str("quoted"),
            OrderPhase::Signed => f.write_str("signed"),
            OrderPhase::Submitted => f.write_str("submitted"),
            OrderPhase::Confirmed => f.write_str("confirmed"),
            OrderPhase::Failed => f.write_str("failed"),
            OrderPhase::Intent(status) => write!(f, "{}", status),
        }
    }
}

/// One execution event against an intent order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fill {
    pub signature: String,
    pub qty_in: u64,
    pub qty_out: u64,
    pub observed_at: DateTime<Utc>,
}

impl Fill {
    pub fn new(signature: impl Into<String>, qty_in: u64, qty_out: u64) -> Self {
        Self {
            signature: signature.into(),
            qty_in,
            qty_out,
            observed_at: Utc::now(),
        }
    }
}

/// Outcome of merging a batch of observed fills
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub added: usize,
    pub duplicates: usize,
    pub rejected: Vec<OrderError>,
}

/// Append-only, signature-deduplicated fill list bounded by the
/// requested input amount.
#[derive(Debug, Clone, Default)]
pub struct FillLedger {
    requested_in: u64,
    fills: Vec<Fill>,
    seen: HashSet<String>,
    total_in: u64,
    total_out: u64,
}

impl FillLedger {
    pub fn new(requested_in: u64) -> Self {
        Self {
            requested_in,
            ..Default::default()
        }
    }

    /// Append one fill. Returns `Ok(false)` for an already-seen signature.
    pub fn record(&mut self, fill: Fill) -> Result<bool, OrderError> {
        if self.seen.contains(&fill.signature) {
            return Ok(false);
        }
        let total_in = self.total_in.checked_add(fill.qty_in).ok_or(OrderError::Overflow)?;
        if total_in > self.requested_in {
            return Err(OrderError::OverFill {
                requested: self.requested_in,
                filled: self.total_in,
                attempted: fill.qty_in,
            });
        }
        let total_out = self.total_out.checked_add(fill.qty_out).ok_or(OrderError::Overflow)?;

        self.total_in = total_in;
        self.total_out = total_out;
        self.seen.insert(fill.signature.clone());
        self.fills.push(fill);
        Ok(true)
    }

    pub fn merge(&mut self, fills: impl IntoIterator<Item = Fill>) -> MergeReport {
        let mut report = MergeReport::default();
        for fill in fills {
            match self.record(fill) {
                Ok(true) => report.added += 1,
                Ok(false) => report.duplicates += 1,
                Err(e) => report.rejected.push(e),
            }
        }
        report
    }

    pub fn fills(&self) -> &[Fill] {
        &self.fills
    }

    pub fn is_empty(&self) -> bool {
        self.fills.is_empty()
    }

    pub fn total_in(&self) -> u64 {
        self.total_in
    }

    pub fn total_out(&self) -> u64 {
        self.total_out
    }

    pub fn requested_in(&self) -> u64 {
        self.requested_in
    }

    pub fn is_partial(&self) -> bool {
        self.total_in < self.requested_in
    }
}

/// Unit of execution, one per settlement attempt.
///
/// Phases only move forward along the sync or async table; once
/// submitted, only the intent status and the fill ledger change.
#[derive(Debug, Clone)]
pub struct Order {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    phase: OrderPhase,
    mode: Option<ExecutionMode>,
    signature: Option<String>,
    ledger: FillLedger,
}

impl Order {
    pub fn new() -> Self {
        Self {
            id: utils::generate_id(),
            created_at: Utc::now(),
            phase: OrderPhase::Created,
            mode: None,
            signature: None,
            ledger: FillLedger::default(),
        }
    }

    pub fn phase(&self) -> OrderPhase {
        self.phase
    }

    pub fn mode(&self) -> Option<ExecutionMode> {
        self.mode
    }

    pub fn signature(&self) -> Option<&str> {
        self.signature.as_deref()
    }

    pub fn ledger(&self) -> &FillLedger {
        &self.ledger
    }

    fn invalid(&self, to: impl fmt::Display) -> OrderError {
        OrderError::InvalidTransition {
            from: self.phase.to_string(),
            to: to.to_string(),
        }
    }

    pub fn mark_quoted(&mut self, mode: ExecutionMode, requested_in: u64) -> Result<(), OrderError> {
        if self.phase != OrderPhase::Created {
            return Err(self.invalid(OrderPhase::Quoted));
        }
        self.mode = Some(mode);
        self.ledger = FillLedger::new(requested_in);
        self.phase = OrderPhase::Quoted;
        Ok(())
    }

    pub fn mark_signed(&mut self, signature: impl Into<String>) -> Result<(), OrderError> {
        if self.phase != OrderPhase::Quoted {
            return Err(self.invalid(OrderPhase::Signed));
        }
        self.signature = Some(signature.into());
        self.phase = OrderPhase::Signed;
        Ok(())
    }

    /// Marks submission. Intent orders start life as `open`. The declarative
    /// path learns its signature only here, from the settlement service.
    pub fn mark_submitted(&mut self, signature: Option<String>) -> Result<(), OrderError> {
        if self.phase != OrderPhase::Signed {
            return Err(self.invalid(OrderPhase::Submitted));
        }
        if let Some(sig) = signature {
            self.signature = Some(sig);
        }
        self.phase = match self.mode {
            Some(ExecutionMode::Async) => OrderPhase::Intent(IntentStatus::Open),
            _ => OrderPhase::Submitted,
        };
        Ok(())
    }

    pub fn settle_sync(&mut self, confirmed: bool) -> Result<(), OrderError> {
        let next = if confirmed { OrderPhase::Confirmed } else { OrderPhase::Failed };
        if self.phase != OrderPhase::Submitted || self.mode != Some(ExecutionMode::Sync) {
            return Err(self.invalid(next));
        }
        self.phase = next;
        Ok(())
    }

    pub fn observe_intent(&mut self, status: IntentStatus) -> Result<(), OrderError> {
        match self.phase {
            OrderPhase::Intent(current) if current.can_advance_to(status) => {
                self.phase = OrderPhase::Intent(status);
                Ok(())
            }
            _ => Err(self.invalid(OrderPhase::Intent(status))),
        }
    }

    pub fn merge_fills(&mut self, fills: impl IntoIterator<Item = Fill>) -> Result<MergeReport, OrderError> {
        if !matches!(self.phase, OrderPhase::Intent(_)) {
            return Err(self.invalid("fill"));
        }
        Ok(self.ledger.merge(fills))
    }
}

impl Default for Order {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_transition_table() {
        use IntentStatus::*;
        assert!(Open.can_transition_to(Open));
        assert!(Open.can_transition_to(PendingClose));
        assert!(Open.can_transition_to(OpenExpired));
        assert!(Open.can_transition_to(OpenFailed));
        assert!(!Open.can_transition_to(Closed));
        assert!(PendingClose.can_transition_to(Closed));
        assert!(!PendingClose.can_transition_to(Open));
        assert!(!Closed.can_transition_to(Open));
        assert!(!OpenFailed.can_transition_to(Closed));

        assert!(Open.can_advance_to(Closed));
        assert!(!PendingClose.can_advance_to(OpenFailed));
    }

    #[test]
    fn test_parse_status() {
        assert_eq!(IntentStatus::parse("pendingClose"), Some(IntentStatus::PendingClose));
        assert_eq!(IntentStatus::parse("openExpired"), Some(IntentStatus::OpenExpired));
        assert_eq!(IntentStatus::parse("weird"), None);
        assert!(IntentStatus::Closed.is_terminal());
        assert!(!IntentStatus::PendingClose.is_terminal());
        assert!(IntentStatus::OpenFailed.is_failure());
    }

    #[test]
    fn test_ledger_sums_and_dedups() {
        let mut ledger = FillLedger::new(10_000_000);
        let report = ledger.merge(vec![
            Fill::new("tx1", 4_000_000, 3_800_000),
            Fill::new("tx1", 4_000_000, 3_800_000),
            Fill::new("tx2", 6_000_000, 5_700_000),
        ]);
        assert_eq!(report.added, 2);
        assert_eq!(report.duplicates, 1);
        assert_eq!(ledger.total_in(), 10_000_000);
        assert_eq!(ledger.total_out(), 9_500_000);
        assert!(!ledger.is_partial());
        assert_eq!(ledger.fills()[0].signature, "tx1");
    }

    #[test]
    fn test_ledger_rejects_over_fill() {
        let mut ledger = FillLedger::new(5_000_000);
        assert!(ledger.record(Fill::new("tx1", 4_000_000, 3_800_000)).unwrap());
        let err = ledger.record(Fill::new("tx2", 2_000_000, 1_900_000)).unwrap_err();
        assert_eq!(
            err,
            OrderError::OverFill { requested: 5_000_000, filled: 4_000_000, attempted: 2_000_000 }
        );
        assert_eq!(ledger.total_in(), 4_000_000);
        assert!(ledger.is_partial());
    }

    #[test]
    fn test_sync_order_lifecycle() {
        let mut order = Order::new();
        order.mark_quoted(ExecutionMode::Sync, 10).unwrap();
        assert!(order.mark_submitted(None).is_err());
        order.mark_signed("sig").unwrap();
        order.mark_submitted(None).unwrap();
        assert_eq!(order.phase(), OrderPhase::Submitted);
        assert!(order.observe_intent(IntentStatus::Closed).is_err());
        order.settle_sync(true).unwrap();
        assert_eq!(order.phase(), OrderPhase::Confirmed);
        assert!(order.settle_sync(false).is_err());
        assert_eq!(order.signature(), Some("sig"));
    }

    #[test]
    fn test_async_order_lifecycle() {
        let mut order = Order::new();
        order.mark_quoted(ExecutionMode::Async, 10_000_000).unwrap();
        order.mark_signed("local").unwrap();
        order.mark_submitted(Some("remote".to_string())).unwrap();
        assert_eq!(order.phase(), OrderPhase::Intent(IntentStatus::Open));
        assert_eq!(order.signature(), Some("remote"));

        order.merge_fills(vec![Fill::new("f1", 4_000_000, 3_800_000)]).unwrap();
        order.observe_intent(IntentStatus::PendingClose).unwrap();
        assert!(order.observe_intent(IntentStatus::Open).is_err());
        order.observe_intent(IntentStatus::Closed).unwrap();
        assert!(order.phase().is_terminal());
        assert!(order.settle_sync(true).is_err());
        assert_eq!(order.ledger().total_out(), 3_800_000);
    }
}
