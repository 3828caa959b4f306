//! Prelude module for convenient imports.
//!
//! Re-exports the types most call sites need. Import this to get started
//! quickly:
//!
//! ```rust
//! use iotedge_gateway_core::prelude::*;
//! ```
//!
//! # What's included
//!
//! ## Message
//! - [`Message`] — the immutable, reference-counted envelope
//! - [`PropertyMap`] — its ordered property map
//!
//! ## Broker
//! - [`Broker`] — the publish/dispatch engine
//! - [`BrokerError`] — its error taxonomy
//!
//! ## Module contract
//! - [`ModuleApi`] / [`ModuleInstance`] — the factory/instance trait pair
//! - [`ApiVersion`] — the vtable version negotiated at load time
//!
//! ## Loader
//! - [`Loader`] — the loader strategy trait
//! - [`LoaderRegistry`] — the process-wide `name -> Loader` map
//! - [`LoaderType`] — the closed loader-type enum
//!
//! ## Gateway
//! - [`Gateway`] — the graph manager
//! - [`GatewayProperties`] / [`ModuleEntry`] / [`LinkEntry`] / [`LinkSource`]
//!   — its configuration-handoff types
//! - [`GatewaySubscription`] — its lifecycle event subscription
//!
//! ## Async sequencer
//! - [`Sequencer`] / [`Step`] — the ordered-steps-with-short-circuit engine
//! - [`SequencerState`] — its `Pending -> Running -> (Complete | Error)` state
//!
//! ## Monitoring
//! - [`Monitor`] — the generic event-observation trait
//! - [`InMemoryMonitor`] / [`NoopMonitor`] — its two implementations
//! - [`GatewayEvent`] / [`ModuleEvent`] / [`BrokerEvent`] / [`MailboxEvent`] /
//!   [`SequencerEvent`] — the per-component event types

pub use crate::broker::{Broker, BrokerError};
pub use crate::gateway::{
    Gateway, GatewayError, GatewayNotification, GatewayProperties, GatewaySubscription, LinkEntry,
    LinkSource, ModuleEntry,
};
pub use crate::loader::{Loader, LoaderError, LoaderRegistry, LoaderType};
pub use crate::mailbox::{QueueReceiver, QueueSender};
pub use crate::message::{Message, PropertyMap};
pub use crate::module::{ApiVersion, ModuleApi, ModuleError, ModuleInstance};
pub use crate::monitoring::{
    BrokerEvent, EventSeverity, GatewayEvent, InMemoryMonitor, MailboxEvent, Monitor,
    MonitoringEvent, ModuleEvent, NoopMonitor, SequencerEvent,
};
pub use crate::sequencer::{Sequencer, SequencerState, Step};
