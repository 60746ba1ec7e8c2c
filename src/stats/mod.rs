//! Statistics for the gateway

pub mod metrics;

pub use metrics::{GatewayStats, StatsSnapshot};
