//! The module contract (spec.md §4.3): a factory trait that turns a
//! configuration blob into a live instance, and the live instance itself.
//!
//! The original is specified as a six-slot C vtable
//! (`parse_configuration_from_json`, `free_configuration`, `create`,
//! `destroy`, `receive`, `start`). Two slots collapse for free in Rust:
//! `free_configuration` is subsumed by `serde_json::Value`'s own `Drop`, and
//! `destroy` is subsumed by `Arc<dyn ModuleInstance>`'s reference counting —
//! the module's own `Drop` impl (if any) runs when the last broker/gateway
//! reference is released.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::broker::Broker;
use crate::message::Message;
use crate::module::error::ModuleError;

/// Version of the module vtable a loader negotiates against.
///
/// A module whose declared version exceeds [`ApiVersion::CURRENT`] must be
/// rejected by the loader before `create` is ever invoked (spec.md §4.3:
/// "a module is well-formed iff ... version ≤ current ApiVersion").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ApiVersion(pub u32);

impl ApiVersion {
    /// The highest module API version this gateway core understands.
    pub const CURRENT: ApiVersion = ApiVersion(1);

    /// Whether a module declaring this version can be loaded by a host that
    /// understands up to [`ApiVersion::CURRENT`].
    pub fn is_supported(self) -> bool {
        self <= Self::CURRENT
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Factory side of the module contract: given a configuration blob, produce
/// a live [`ModuleInstance`]. One `ModuleApi` is resolved per loaded module
/// (e.g. once per native dynamic library); many instances may in principle
/// share it, though the gateway only ever creates one.
#[async_trait]
pub trait ModuleApi: Send + Sync {
    /// The vtable version this module declares.
    fn api_version(&self) -> ApiVersion;

    /// Converts a JSON configuration document into the module's internal
    /// configuration value. Returns `Value::Null` for "no configuration".
    fn parse_configuration_from_json(&self, text: &str) -> Result<Value, ModuleError> {
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(text).map_err(|e| ModuleError::ConfigurationParse {
            reason: e.to_string(),
        })
    }

    /// Instantiates the module, handing it the broker reference it should
    /// use for publishing and the fully assembled configuration value.
    async fn create(
        &self,
        broker: Broker,
        config: Value,
    ) -> Result<Arc<dyn ModuleInstance>, ModuleError>;
}

/// The live handle returned by [`ModuleApi::create`]. The broker's worker
/// calls `receive` for every message the module is linked to; the gateway
/// calls `start` once, after the whole graph (modules + links) exists.
#[async_trait]
pub trait ModuleInstance: Send + Sync {
    /// Delivers a message published by one of this module's publishers.
    /// Must not block for long (spec.md §4.3) — the broker's per-module
    /// worker processes one message at a time.
    async fn receive(&self, message: Message);

    /// Signals "the graph is live, you may begin emitting". Optional in the
    /// original contract; the default is a no-op.
    async fn start(&self) -> Result<(), ModuleError> {
        Ok(())
    }
}
