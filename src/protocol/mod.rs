//! # Protocol Reconstruction
//!
//! Turns reassembled packets into queries and results, one state machine per
//! captured connection.
//!
//! ## Components
//! - **Identity**: client endpoint, correlation key, direction
//! - **Command**: command bytes and response field decoders
//! - **Classifier**: pure packet classification against a state view
//! - **Connection**: per-connection state machine
//! - **Dispatcher**: handoff to replay and statistics
//! - **Registry**: concurrent identity-to-state map, the capture entry point
//! - **Query**: captured query records
//!
//! ## Flow
//! ```text
//! bytes -> ReassemblyBuffer -> Packet -> classify -> ConnectionState -> Dispatcher
//! ```

pub mod classifier;
pub mod command;
pub mod connection;
pub mod dispatcher;
pub mod identity;
pub mod query;
pub mod registry;


pub use classifier::{classify, Classification, PacketKind};
pub use connection::{ConnectionPhase, ConnectionState};
pub use dispatcher::Dispatcher;
pub use identity::{ConnectionIdentity, Direction, Origin};
pub use query::{LastExecutedQueryInfo, QueryResult, QueryStatus};
pub use registry::ConnectionRegistry;
