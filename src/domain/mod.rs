//! Domain layer - amounts in flight, orders, quotes and redemption rules

pub mod execution;
pub mod price;
pub mod quote;
pub mod redemption;
