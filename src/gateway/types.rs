//! Configuration-handoff types and the wildcard constant (spec.md §3,
//! SPEC_FULL.md §A.3/§B). JSON parsing itself is out of scope (spec.md
//! §1); these are the plain `serde`-derived structs an external front-end
//! deserializes directly into before calling [`crate::gateway::Gateway::create`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::loader::LoaderRegistryEntry;

/// The reserved wildcard source token (spec.md §3): `(source=ANY, sink=M)`
/// means "every other module in the gateway publishes to M".
pub const WILDCARD: &str = "*";

/// Whether `name` is the reserved wildcard token. Used uniformly by
/// module-name validation and link-source parsing.
pub fn is_wildcard(name: &str) -> bool {
    name == WILDCARD
}

/// One `gateway_modules` entry: names a loader and hands it an entry point
/// plus optional module-level configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModuleEntry {
    pub name: String,
    pub loader: String,
    pub entrypoint: Value,
    #[serde(default)]
    pub args: Option<Value>,
}

/// A link's source: either a named module or the `*` wildcard.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LinkSource {
    Any,
    Module(String),
}

impl LinkSource {
    pub fn parse(text: &str) -> Self {
        if is_wildcard(text) {
            Self::Any
        } else {
            Self::Module(text.to_string())
        }
    }
}

impl Serialize for LinkSource {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Any => serializer.serialize_str(WILDCARD),
            Self::Module(name) => serializer.serialize_str(name),
        }
    }
}

impl<'de> Deserialize<'de> for LinkSource {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Ok(Self::parse(&text))
    }
}

/// One `gateway_links` entry. Equality of the resulting gateway link record
/// follows spec.md §4.2's "Link equality": sinks match and either both are
/// wildcard-sourced or both name the same source module. The derived
/// `PartialEq`/`Hash` on `(LinkSource, String)` already implements exactly
/// this rule, since `LinkSource::Any == LinkSource::Any` regardless of which
/// modules were attached when each was declared.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LinkEntry {
    pub source: LinkSource,
    pub sink: String,
}

/// The declared-link-set record the gateway keeps (spec.md §3's `Link`),
/// distinct from [`LinkEntry`] only in that it is the internal, normalized
/// representation used for duplicate detection and removal lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GatewayLink {
    pub source: LinkSource,
    pub sink: String,
}

impl From<LinkEntry> for GatewayLink {
    fn from(entry: LinkEntry) -> Self {
        Self {
            source: entry.source,
            sink: entry.sink,
        }
    }
}

/// `Gateway::create`'s top-level input. `loader_registry` is the optional
/// `initialize_from_json` augmentation array (SPEC_FULL.md §B); everything
/// else the gateway's JSON front-end would read is out of this crate's
/// scope (spec.md §1).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GatewayProperties {
    #[serde(default)]
    pub modules: Vec<ModuleEntry>,
    #[serde(default)]
    pub links: Vec<LinkEntry>,
    #[serde(default)]
    pub loader_registry: Option<Vec<LoaderRegistryEntry>>,
}
