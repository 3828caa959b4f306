//! The loader contract (spec.md §4.3): a strategy for turning an
//! entry-point descriptor into a live [`ModuleApi`](crate::module::ModuleApi).
//!
//! The C original exposes eight vtable slots. Four collapse in Rust:
//! `FreeEntrypoint`/`FreeConfiguration`/`FreeModuleConfiguration` are
//! subsumed by owned `serde_json::Value`'s `Drop`, and `ParseEntrypointFromJson`/
//! `ParseConfigurationFromJson` (the loader's own base configuration, not the
//! module's) happen once, at loader construction time
//! ([`LoaderRegistry::initialize_from_json`]), rather than as a per-call
//! vtable method.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::loader::error::LoaderError;
use crate::loader::types::{LibraryHandle, LoaderType};
use crate::module::ModuleApi;

#[async_trait]
pub trait Loader: Send + Sync {
    /// Which closed `type_tag` variant this loader implements.
    fn loader_type(&self) -> LoaderType;

    /// The unique name this loader is registered under.
    fn name(&self) -> &str;

    /// Brings the module's code into the process (or attaches its proxy).
    async fn load(&self, entrypoint: &Value) -> Result<LibraryHandle, LoaderError>;

    /// Reverse of [`Loader::load`].
    async fn unload(&self, handle: LibraryHandle) -> Result<(), LoaderError>;

    /// Obtains the module's vtable from an already-loaded handle.
    async fn get_api(&self, handle: &LibraryHandle) -> Result<Arc<dyn ModuleApi>, LoaderError>;

    /// Produces the final configuration handoff object given to the
    /// module's `create`, combining the entry-point descriptor and the
    /// module-level configuration already parsed by [`ModuleApi`].
    fn build_module_configuration(
        &self,
        entrypoint: &Value,
        module_config: Value,
    ) -> Result<Value, LoaderError> {
        let _ = entrypoint;
        Ok(module_config)
    }
}
