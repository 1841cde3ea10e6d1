//! # Core Wire Components
//!
//! Low-level packet framing, reassembly, and snapshot serialization.
//!
//! ## Components
//! - **Packet**: header codec and complete logical packets
//! - **Codec**: Tokio codec splitting packets off a byte buffer
//! - **Reassembly**: per-direction accumulation of capture chunks
//! - **Serialization**: bincode/JSON export of captured query records
//!
//! ## Wire Format
//! ```text
//! [LengthLow(2, LE)] [LengthHigh(1)] [SequenceId(1)] [Payload(N)]
//! ```

pub mod codec;
pub mod packet;
pub mod reassembly;
pub mod serialization;
