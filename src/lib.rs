//! Outcome Settlement - trade settlement engine for prediction-market outcome tokens on Solana
//! Built with Domain-Driven Design principles

pub mod application;
pub mod config;
pub mod domain;
pub mod exchanges;
pub mod infrastructure;
pub mod shared;

// Re-export main types for convenience
pub use application::{RedemptionResolver, TradeExecutor, WalletService};
pub use config::Config;
pub use domain::execution::{TradeRequest, TradeResult};
pub use shared::errors::TradeFailure;
