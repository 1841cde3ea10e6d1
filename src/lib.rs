//! # wire-playback
//!
//! Reconstructs MySQL client/server conversations from captured traffic and
//! hands every query to a replay subsystem, keeping the captured outcome for
//! comparison with the replayed one.
//!
//! ## Layers
//! - [`core`]: packet framing and cross-segment reassembly
//! - [`protocol`]: classification, per-connection state, dispatch, registry
//! - [`replay`]: non-blocking submission, ordered per-session replay, comparison
//! - [`utils`]: logging, statistics, timestamps
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use wire_playback::config::ParserConfig;
//! use wire_playback::protocol::{ConnectionIdentity, ConnectionRegistry, Direction, Dispatcher};
//! use wire_playback::replay::QueueReplayer;
//! use wire_playback::utils::ParserStats;
//!
//! let (replayer, mut jobs) = QueueReplayer::new();
//! let stats = Arc::new(ParserStats::new());
//! let registry = ConnectionRegistry::new(
//!     ParserConfig::default(),
//!     Dispatcher::new(Arc::new(replayer), stats.clone()),
//! );
//!
//! let client = ConnectionIdentity::new(0x0A00_0001, 40000);
//! let query = [0x09, 0x00, 0x00, 0x00, 0x03, b'S', b'E', b'L', b'E', b'C', b'T', b' ', b'1'];
//! registry
//!     .deliver_bytes(client, Direction::ClientToServer, Duration::from_secs(1), &query)
//!     .unwrap();
//!
//! assert!(jobs.try_recv().is_ok());
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod replay;
pub mod utils;

pub use config::PlaybackConfig;
pub use error::{ProtocolError, Result};
pub use protocol::{ConnectionIdentity, ConnectionRegistry, Direction, Dispatcher};
pub use replay::{QueueReplayer, ReplaySubmitter};
pub use utils::{ParserStats, StatsRecorder};
