//! Infrastructure layer

pub mod blockchain;
