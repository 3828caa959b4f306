//! Errors surfaced while validating or instantiating a module.

use thiserror::Error;

use crate::module::api::ApiVersion;

/// Failures that can occur on the factory side of the module contract
/// (spec.md §4.3): configuration parsing and instantiation.
#[derive(Debug, Error)]
pub enum ModuleError {
    /// The module's vtable declares an `ApiVersion` newer than this host
    /// understands.
    #[error("module api version {found} exceeds maximum supported {max}")]
    VersionMismatch { found: ApiVersion, max: ApiVersion },

    /// `parse_configuration_from_json` rejected the configuration text.
    #[error("failed to parse module configuration: {reason}")]
    ConfigurationParse { reason: String },

    /// `create` returned a null handle or otherwise failed to instantiate.
    #[error("module creation failed: {reason}")]
    Creation { reason: String },

    /// A required vtable slot (`create`, `destroy`, `receive`) was absent.
    #[error("module vtable is malformed: {reason}")]
    MalformedApi { reason: String },
}
