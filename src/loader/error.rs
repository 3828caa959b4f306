//! Loader error taxonomy (spec.md §7's `LoaderFailure` family, broken out
//! per vtable slot for useful diagnostics).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoaderError {
    /// `Load` could not bring the module's code into the process.
    #[error("loader `{loader}` failed to load entry point: {reason}")]
    Load { loader: String, reason: String },

    /// `GetApi` returned null or a malformed vtable.
    #[error("loader `{loader}` failed to obtain module api: {reason}")]
    GetApi { loader: String, reason: String },

    /// The entry-point descriptor was missing a required field or was the
    /// wrong shape for this loader type.
    #[error("loader `{loader}` rejected entry point: {reason}")]
    InvalidEntrypoint { loader: String, reason: String },

    /// Loader-level (not module-level) configuration failed to parse.
    #[error("loader `{loader}` rejected configuration: {reason}")]
    InvalidConfiguration { loader: String, reason: String },

    /// A handle was passed to the wrong loader implementation.
    #[error("loader `{loader}` received a handle it did not create")]
    MismatchedHandle { loader: String },

    /// `find_by_name` found nothing registered under this name.
    #[error("no loader registered under the name `{name}`")]
    NotFound { name: String },

    /// A loader of this name was already registered.
    #[error("a loader is already registered under the name `{name}`")]
    Duplicate { name: String },

    /// Out-of-process transport failure (spawn, broken pipe, protocol
    /// desync) surfaced from the remote-module-host loader.
    #[error("out-of-process loader `{loader}` transport error: {reason}")]
    Transport { loader: String, reason: String },

    /// The module itself is malformed or declares an unsupported api
    /// version (spec.md §4.3) — surfaced from `get_api`'s well-formedness
    /// check.
    #[error(transparent)]
    Module(#[from] crate::module::ModuleError),
}
