//! # iotedge-gateway-core — pluggable IoT edge gateway core
//!
//! The core of a pluggable IoT edge gateway: a message broker with
//! per-module worker tasks and bounded queues, a graph manager that keeps
//! the broker's link table consistent with a declared module/link
//! topology (including a `*` wildcard source), a polymorphic module
//! loader registry, and a reusable cooperative async sequencer for
//! modules that drive long chains of platform I/O.
//!
//! # Quick start
//!
//! ```rust,ignore
//! use iotedge_gateway_core::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let properties = GatewayProperties {
//!         modules: vec![ModuleEntry {
//!             name: "logger".to_string(),
//!             loader: "native".to_string(),
//!             entrypoint: serde_json::json!({ "path": "./modules/liblogger.so" }),
//!             args: None,
//!         }],
//!         links: vec![LinkEntry {
//!             source: LinkSource::Any,
//!             sink: "logger".to_string(),
//!         }],
//!         loader_registry: None,
//!     };
//!
//!     let gateway = Gateway::create(properties).await?;
//!     gateway.start().await?;
//!     gateway.publish("logger", Message::with_payload(b"hello".to_vec()))?;
//!     gateway.destroy().await;
//!     Ok(())
//! }
//! ```
//!
//! # Module organization
//!
//! - [`message`] — the immutable, reference-counted message envelope and
//!   its canonical wire serialization.
//! - [`mailbox`] — the bounded, per-module inbound queue backing the
//!   broker's dispatch workers.
//! - [`broker`] — the publish/dispatch engine: one worker per attached
//!   module, a directed link table, reference-counted lifetime.
//! - [`module`] — the module contract (factory + live instance) every
//!   loaded module implements.
//! - [`loader`] — the loader abstraction (native dynamic library,
//!   out-of-process host) and the process-wide loader registry.
//! - [`gateway`] — the graph manager: the user-facing
//!   create/add/remove/start/destroy surface and its lifecycle events.
//! - [`sequencer`] — the reusable ordered-async-steps-with-short-circuit
//!   engine used by I/O-heavy modules.
//! - [`monitoring`] — structured event observation across every
//!   component above.
//!
//! # Concurrency model
//!
//! The broker is the only source of threads this crate spawns on its own
//! (one worker task per attached module); `gateway` graph-mutation calls
//! execute on the caller's task and must be serialized by the caller
//! (spec.md §5) — the broker itself tolerates concurrent `publish` from any
//! number of module workers.
//!
//! # Out of scope
//!
//! Configuration-file JSON parsing, the concrete behavior of end-user
//! modules, CLI argument parsing, and build tooling are external
//! collaborators this crate does not implement — see `spec.md` §1.

pub mod broker;
pub mod gateway;
pub mod loader;
pub mod mailbox;
pub mod message;
pub mod module;
pub mod monitoring;
pub mod sequencer;

pub mod prelude;

pub use broker::{Broker, BrokerError};
pub use gateway::{
    is_wildcard, Gateway, GatewayError, GatewayLink, GatewayNotification, GatewayProperties,
    GatewaySubscription, LinkEntry, LinkSource, ModuleEntry, WeakGateway, WILDCARD,
};
pub use loader::{
    LibraryHandle, Loader, LoaderError, LoaderRegistry, LoaderRegistryEntry, LoaderType,
    NativeLoader, OutOfProcessLoader,
};
pub use mailbox::{QueueMetrics, QueueReceiver, QueueSender, DEFAULT_QUEUE_CAPACITY};
pub use message::{Message, MessageError, PropertyMap};
pub use module::{ApiVersion, ModuleApi, ModuleError, ModuleInstance};
pub use monitoring::{
    BrokerEvent, BrokerEventKind, GatewayEvent, GatewayEventKind, InMemoryMonitor, MailboxEvent,
    MailboxEventKind, Monitor, ModuleEvent, ModuleEventKind, MonitoringConfig, MonitoringError,
    MonitoringSnapshot, NoopMonitor, SequencerEvent, SequencerEventKind,
};
pub use sequencer::{
    FinishFn, OnComplete, OnError, Sequencer, SequencerError, SequencerState, StartFn, Step,
};
