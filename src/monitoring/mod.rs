//! # Monitoring Module
//!
//! Universal monitoring infrastructure for observing and tracking events across all runtime components.
//!
//! ## Features
//! - **Generic Monitor<E> Trait**: Universal monitoring for any entity type
//! - **Zero-Cost Abstraction**: NoopMonitor compiles away when disabled
//! - **Lock-Free Recording**: Atomic counters for concurrent event tracking
//! - **Type Safety**: MonitoringEvent trait ensures compile-time correctness
//!
//! ## Event Types
//! - `GatewayEvent`: Gateway lifecycle (created, destroyed, module list changes)
//! - `ModuleEvent`: Per-module lifecycle within the broker (attach, start, drain, fault)
//! - `BrokerEvent`: Link-table mutation and publish/dispatch activity
//! - `MailboxEvent`: Per-module queue enqueue/deliver/drop
//! - `SequencerEvent`: Async sequencer step progression
//!
//! ## Examples
//! ```rust,ignore
//! use iotedge_gateway_core::monitoring::{InMemoryMonitor, MonitoringConfig, ModuleEvent};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = MonitoringConfig::default();
//! let monitor = InMemoryMonitor::new(config);
//!
//! // Record events
//! // monitor.record(event).await?;
//!
//! // Take snapshots
//! // let snapshot = monitor.snapshot().await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod in_memory;
pub mod noop;
pub mod traits;
pub mod types;

pub use error::MonitoringError;
pub use in_memory::InMemoryMonitor;
pub use noop::NoopMonitor;
pub use traits::{EventSeverity, Monitor, MonitoringEvent};
pub use types::{
    BrokerEvent, BrokerEventKind, GatewayEvent, GatewayEventKind, MailboxEvent, MailboxEventKind,
    ModuleEvent, ModuleEventKind, MonitoringConfig, MonitoringSnapshot, SequencerEvent,
    SequencerEventKind,
};
