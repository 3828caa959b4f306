//! Per-module bounded inbound queues backing the broker's dispatch workers.

pub mod metrics;
pub mod queue;

pub use metrics::QueueMetrics;
pub use queue::{bounded, QueueReceiver, QueueSender, DEFAULT_QUEUE_CAPACITY};
