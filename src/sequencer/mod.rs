//! The reusable "ordered async steps with error short-circuit" engine
//! (spec.md §4.4) that I/O-heavy modules — the reference implementation's
//! BLE GATT module chief among them — build their operations out of.

pub mod error;
pub mod sequencer;

pub use error::SequencerError;
pub use sequencer::{FinishFn, OnComplete, OnError, Sequencer, SequencerState, StartFn, Step};
