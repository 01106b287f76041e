pub mod config;
pub mod signal;
pub mod store;
pub mod telemetry;
