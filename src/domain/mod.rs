//! Core domain types and logic.

pub mod ohlcv;
pub mod signal;
pub mod position;
pub mod execution;
pub mod position_manager;
pub mod indicator;
pub mod strategy;
pub mod simulation;
pub mod metrics;
pub mod optimizer;
pub mod config_validation;
pub mod error;
