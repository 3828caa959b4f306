//! Shared loader data: the closed loader-type enum (spec.md §3) and the
//! opaque library handle each loader hands back to the gateway.

use std::ffi::c_void;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// `type_tag` from spec.md §3. `Native` is the only mandatory loader; the
/// rest are "optional-by-build" — this crate ships `OutOfProcess` and
/// stubs out the managed-runtime variants (spec.md §9, SPEC_FULL.md §B).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoaderType {
    Native,
    OutOfProcess,
    ManagedA,
    ManagedB,
    Interpreted,
}

/// The loader-specific resource backing a loaded module (spec.md §3's
/// `library_handle`). Each variant is the resource a concrete loader
/// implementation actually produces.
#[derive(Clone)]
pub enum LibraryHandle {
    /// An open dynamic library plus the raw module vtable pointer it
    /// exported. The `Arc<Library>` must outlive every `ModuleApi`/
    /// `ModuleInstance` built from it — the module's code lives in these
    /// pages.
    Native {
        library: Arc<libloading::Library>,
        table: *const NativeModuleApiTable,
    },
    /// A spawned (or attached) subprocess acting as a remote module host.
    OutOfProcess(Arc<crate::loader::out_of_process::RemoteHost>),
    /// A loader-defined in-process resource that is neither a dynamic
    /// library nor a subprocess (an in-process test double, or a future
    /// managed-runtime host). Opaque to everything but the loader that
    /// produced it.
    Opaque(Arc<dyn std::any::Any + Send + Sync>),
}

// SAFETY: the raw `table` pointer is produced by `Module_GetApi` and is
// expected to remain valid (and immutable) for the lifetime of `library`,
// which this handle keeps alive via `Arc`. The native module is contractually
// required to be safe to call from any thread (spec.md §4.1 dispatches
// `receive` from arbitrary worker threads).
unsafe impl Send for LibraryHandle {}
unsafe impl Sync for LibraryHandle {}

impl fmt::Debug for LibraryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LibraryHandle::Native { table, .. } => {
                f.debug_struct("LibraryHandle::Native").field("table", table).finish()
            }
            LibraryHandle::OutOfProcess(host) => {
                f.debug_tuple("LibraryHandle::OutOfProcess").field(host).finish()
            }
            LibraryHandle::Opaque(_) => f.write_str("LibraryHandle::Opaque"),
        }
    }
}

/// The native module's exported vtable (spec.md §4.3, §6). Mirrors the six
/// module-contract methods; `free_configuration`/`destroy` are represented
/// here because they cross the FFI boundary, even though the safe Rust side
/// (`module::ModuleApi`/`ModuleInstance`) folds them into RAII.
#[repr(C)]
pub struct NativeModuleApiTable {
    pub api_version: u32,
    pub parse_configuration_from_json:
        Option<unsafe extern "C" fn(text: *const u8, text_len: usize) -> *mut c_void>,
    pub free_configuration: Option<unsafe extern "C" fn(config: *mut c_void)>,
    pub create: Option<
        unsafe extern "C" fn(host: *const NativeHostApi, config: *mut c_void) -> *mut c_void,
    >,
    pub destroy: Option<unsafe extern "C" fn(handle: *mut c_void)>,
    pub receive:
        Option<unsafe extern "C" fn(handle: *mut c_void, message: *const u8, message_len: usize)>,
    pub start: Option<unsafe extern "C" fn(handle: *mut c_void) -> i32>,
}

/// Host callbacks handed to a native module's `create`, so it can publish
/// without needing to know it is talking to a Rust broker (grounded in the
/// host-vtable-of-callbacks pattern the native plugin loaders in the
/// retrieved pack use for their FFI boundary).
#[repr(C)]
pub struct NativeHostApi {
    pub ctx: *mut c_void,
    pub publish: unsafe extern "C" fn(
        ctx: *mut c_void,
        publisher_name: *const u8,
        publisher_name_len: usize,
        message: *const u8,
        message_len: usize,
    ) -> i32,
}
