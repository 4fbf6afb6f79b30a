//! Application layer - settlement workflows and CLI handlers

pub mod async_monitor;
pub mod clock;
pub mod commands;
pub mod redemption_service;
pub mod sync_monitor;
pub mod trade_executor;
pub mod wallet_service;

#[cfg(test)]
pub mod test_support;

pub use async_monitor::{AsyncOrderMonitor, FinalOrderState, OrderSnapshot};
pub use clock::{PollSchedule, Sleeper, TokioSleeper};
pub use commands::{Cli, CommandExecutor, Commands};
pub use redemption_service::RedemptionResolver;
pub use sync_monitor::{ConfirmationResult, SubmissionMonitor};
pub use trade_executor::{MonitorOptions, TradeExecutor};
pub use wallet_service::{TransferReceipt, WalletService};
