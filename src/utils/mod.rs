//! # Utility Modules
//!
//! ## Components
//! - **Logging**: `tracing-subscriber` setup from [`crate::config::LoggingConfig`]
//! - **Metrics**: Thread-safe server counters

pub mod logging;
pub mod metrics;

pub use metrics::{Metrics, MetricsSnapshot};
