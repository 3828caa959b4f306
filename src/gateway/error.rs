//! The gateway's user-facing error type (spec.md §7): composes the broker,
//! module, and loader taxonomies via `#[from]` plus graph-manager-only
//! variants.

use thiserror::Error;

use crate::broker::BrokerError;
use crate::loader::LoaderError;
use crate::module::ModuleError;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// `add_module` was called with an empty name.
    #[error("module name must not be empty")]
    EmptyName,

    /// `add_module` was called with the reserved wildcard token as a name.
    #[error("module name `*` is reserved for the wildcard link source")]
    ReservedWildcardName,

    /// A module of this name is already attached.
    #[error("module `{name}` is already attached to the gateway")]
    DuplicateModule { name: String },

    /// `remove_module`, `add_link`, or `remove_link` referenced a module
    /// that isn't attached.
    #[error("module `{name}` is not attached to the gateway")]
    ModuleNotFound { name: String },

    /// A link endpoint (source or sink) names a module that isn't attached.
    #[error("link references unknown module `{name}`")]
    LinkEndpointNotFound { name: String },

    /// `add_link` was called with a link already present under spec.md
    /// §4.2's equivalence rule.
    #[error("link already exists")]
    DuplicateLink,

    /// `remove_link` was called with a link absent under spec.md §4.2's
    /// equivalence rule.
    #[error("link does not exist")]
    LinkNotFound,

    /// The loader named in a module entry isn't registered.
    #[error("no loader registered under the name `{name}`")]
    LoaderNotFound { name: String },

    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error(transparent)]
    Loader(#[from] LoaderError),

    #[error(transparent)]
    Module(#[from] ModuleError),
}
