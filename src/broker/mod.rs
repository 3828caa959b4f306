//! The publish/dispatch engine at the core of the gateway (spec.md §4.1):
//! per-module worker tasks, bounded per-subscriber queues, and a directed
//! link table the gateway graph manager keeps in sync with its declared
//! topology.

pub mod broker;
pub mod error;

pub use broker::Broker;
pub use error::BrokerError;
