//! # Utility Modules
//!
//! Supporting utilities for logging, timing, and statistics.
//!
//! ## Components
//! - **Logging**: tracing subscriber setup
//! - **Time**: capture timestamp conversions
//! - **Metrics**: the statistics boundary and its atomic-counter recorder

pub mod logging;
pub mod metrics;
pub mod time;

pub use metrics::{EventKind, EventTimestamps, ParserStats, StatsRecorder};
