//! Background scanning and generation handoff
//!
//! - `gate`: the flags shared between the worker and the consumer
//! - `worker`: the gated background thread
//! - `builder`: fills a snapshot from discovery and finalizes it
//! - `buffer`: the foreground/background pair and its swap

pub mod buffer;
pub mod builder;
pub mod gate;
pub mod worker;

pub use buffer::{DoubleBuffer, Slot};
pub use builder::{FinalizeReport, GatherReport, SnapshotBuilder};
pub use gate::{ScanGate, SharedGate};
pub use worker::{ScanWorker, ScanWorkerConfig};
