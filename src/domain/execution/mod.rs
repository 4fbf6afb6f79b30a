//! Execution domain - orders, fills, trade requests and results

mod order;
mod trade_request;
mod trade_result;

pub use order::{Fill, FillLedger, IntentStatus, MergeReport, Order, OrderPhase};
pub use trade_request::{TradeRequest, TradeRoute};
pub use trade_result::{realized_amounts, TradeResult, TradeStatus};
