//! Native dynamic-library loader (spec.md §4.3, §6): opens a shared object,
//! resolves its `Module_GetApi` export, and wraps the returned C vtable as a
//! safe [`ModuleApi`]/[`ModuleInstance`] pair.
//!
//! The FFI boundary mirrors the `extern "C"` host-callback-table pattern
//! used by dynamically-loaded plugin hosts in the retrieved pack: the native
//! module never touches Rust types directly, only raw pointers and a small
//! host vtable ([`NativeHostApi`]) it can call back into for publishing.

use std::ffi::c_void;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::broker::Broker;
use crate::loader::error::LoaderError;
use crate::loader::traits::Loader;
use crate::loader::types::{LibraryHandle, LoaderType, NativeHostApi, NativeModuleApiTable};
use crate::message::Message;
use crate::module::{ApiVersion, ModuleApi, ModuleError, ModuleInstance};

const ENTRY_SYMBOL: &[u8] = b"Module_GetApi\0";

type GetApiFn = unsafe extern "C" fn(api_version: u32) -> *const NativeModuleApiTable;

/// Opens an in-process dynamic library and retrieves its module vtable.
pub struct NativeLoader {
    name: String,
}

impl NativeLoader {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Loader for NativeLoader {
    fn loader_type(&self) -> LoaderType {
        LoaderType::Native
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn load(&self, entrypoint: &Value) -> Result<LibraryHandle, LoaderError> {
        let path = entrypoint
            .get("path")
            .and_then(Value::as_str)
            .ok_or_else(|| LoaderError::InvalidEntrypoint {
                loader: self.name.clone(),
                reason: "entry point is missing a `path` field".to_string(),
            })?
            .to_string();

        let loader_name = self.name.clone();
        let library = tokio::task::spawn_blocking(move || unsafe { libloading::Library::new(&path) })
            .await
            .map_err(|join_err| LoaderError::Load {
                loader: loader_name.clone(),
                reason: format!("library-load task did not complete: {join_err}"),
            })?
            .map_err(|e| LoaderError::Load {
                loader: loader_name,
                reason: e.to_string(),
            })?;
        let library = Arc::new(library);

        let table = unsafe {
            let symbol = library
                .get::<GetApiFn>(ENTRY_SYMBOL)
                .map_err(|e| LoaderError::GetApi {
                    loader: self.name.clone(),
                    reason: format!("missing `Module_GetApi` export: {e}"),
                })?;
            symbol(ApiVersion::CURRENT.0)
        };

        if table.is_null() {
            return Err(LoaderError::GetApi {
                loader: self.name.clone(),
                reason: "Module_GetApi returned a null vtable".to_string(),
            });
        }

        Ok(LibraryHandle::Native { library, table })
    }

    async fn unload(&self, _handle: LibraryHandle) -> Result<(), LoaderError> {
        // Dropping the handle drops the `Arc<Library>`; once the last
        // `ModuleApi`/`ModuleInstance` built from it is also dropped, the
        // native library is unmapped.
        Ok(())
    }

    async fn get_api(&self, handle: &LibraryHandle) -> Result<Arc<dyn ModuleApi>, LoaderError> {
        match handle {
            LibraryHandle::Native { library, table } => {
                let table_ref = unsafe { &**table };
                if table_ref.create.is_none()
                    || table_ref.destroy.is_none()
                    || table_ref.receive.is_none()
                {
                    return Err(LoaderError::GetApi {
                        loader: self.name.clone(),
                        reason: "module vtable is missing a required slot (create/destroy/receive)"
                            .to_string(),
                    });
                }
                // spec.md §4.3: "a module is well-formed iff create, destroy,
                // and receive are non-null and version ≤ current ApiVersion.
                // Loaders must reject modules failing this check."
                let declared_version = ApiVersion(table_ref.api_version);
                if !declared_version.is_supported() {
                    return Err(ModuleError::VersionMismatch {
                        found: declared_version,
                        max: ApiVersion::CURRENT,
                    }
                    .into());
                }
                Ok(Arc::new(NativeModuleApi {
                    library: Arc::clone(library),
                    table: *table,
                }))
            }
            LibraryHandle::OutOfProcess(_) | LibraryHandle::Opaque(_) => {
                Err(LoaderError::MismatchedHandle {
                    loader: self.name.clone(),
                })
            }
        }
    }
}

struct NativeModuleApi {
    library: Arc<libloading::Library>,
    table: *const NativeModuleApiTable,
}

// SAFETY: see `LibraryHandle`'s Send/Sync justification — the native module
// is required to tolerate calls from any broker worker thread.
unsafe impl Send for NativeModuleApi {}
unsafe impl Sync for NativeModuleApi {}

#[async_trait]
impl ModuleApi for NativeModuleApi {
    fn api_version(&self) -> ApiVersion {
        ApiVersion(unsafe { (*self.table).api_version })
    }

    fn parse_configuration_from_json(&self, text: &str) -> Result<Value, ModuleError> {
        let table = unsafe { &*self.table };
        match table.parse_configuration_from_json {
            Some(parse) => {
                // The native side owns the opaque config object it returns;
                // we only ferry the address forward to `create`/`build_module_configuration`
                // as an opaque JSON integer, since this crate cannot know its shape.
                let ptr = unsafe { parse(text.as_ptr(), text.len()) };
                Ok(Value::from(ptr as usize as u64))
            }
            None => Ok(Value::Null),
        }
    }

    async fn create(
        &self,
        broker: Broker,
        config: Value,
    ) -> Result<Arc<dyn ModuleInstance>, ModuleError> {
        let table = unsafe { &*self.table };
        let create_fn = table.create.ok_or_else(|| ModuleError::MalformedApi {
            reason: "module vtable has no create slot".to_string(),
        })?;
        let config_ptr = config.as_u64().unwrap_or(0) as *mut c_void;

        // `broker` must live at a stable heap address for as long as the
        // native module might call back through the host vtable, which can
        // outlast this function — box it before taking its address.
        let broker_box = Box::new(broker);
        let broker_ptr = broker_box.as_ref() as *const Broker as *mut c_void;
        let host = Box::new(NativeHostApi {
            ctx: broker_ptr,
            publish: native_publish_trampoline,
        });
        let host_ptr = host.as_ref() as *const NativeHostApi;

        let handle = unsafe { create_fn(host_ptr, config_ptr) };

        // `create` only reads out of `config_ptr`, it does not retain
        // ownership — release what `parse_configuration_from_json` allocated
        // now that `create` has consumed it (spec.md §4.3: "free_configuration
        // — release what parse_configuration_from_json returned").
        if !config_ptr.is_null() {
            if let Some(free_configuration) = table.free_configuration {
                unsafe { free_configuration(config_ptr) };
            }
        }

        if handle.is_null() {
            return Err(ModuleError::Creation {
                reason: "native module create() returned a null handle".to_string(),
            });
        }

        Ok(Arc::new(NativeModuleInstance {
            _library: Arc::clone(&self.library),
            table: self.table,
            handle,
            _host: host,
            _broker: broker_box,
        }))
    }
}

struct NativeModuleInstance {
    _library: Arc<libloading::Library>,
    table: *const NativeModuleApiTable,
    handle: *mut c_void,
    _host: Box<NativeHostApi>,
    _broker: Box<Broker>,
}

unsafe impl Send for NativeModuleInstance {}
unsafe impl Sync for NativeModuleInstance {}

impl Drop for NativeModuleInstance {
    fn drop(&mut self) {
        if let Some(destroy) = unsafe { (*self.table).destroy } {
            unsafe { destroy(self.handle) };
        }
    }
}

#[async_trait]
impl ModuleInstance for NativeModuleInstance {
    async fn receive(&self, message: Message) {
        let table = unsafe { &*self.table };
        if let Some(receive) = table.receive {
            let bytes = message.to_bytes();
            unsafe { receive(self.handle, bytes.as_ptr(), bytes.len()) };
        }
    }

    async fn start(&self) -> Result<(), ModuleError> {
        let table = unsafe { &*self.table };
        if let Some(start) = table.start {
            let status = unsafe { start(self.handle) };
            if status != 0 {
                return Err(ModuleError::Creation {
                    reason: format!("native module start() returned status {status}"),
                });
            }
        }
        Ok(())
    }
}

unsafe extern "C" fn native_publish_trampoline(
    ctx: *mut c_void,
    publisher_name: *const u8,
    publisher_name_len: usize,
    message: *const u8,
    message_len: usize,
) -> i32 {
    if ctx.is_null() || publisher_name.is_null() || message.is_null() {
        return -1;
    }
    let broker = unsafe { &*(ctx as *const Broker) };
    let name_bytes = unsafe { std::slice::from_raw_parts(publisher_name, publisher_name_len) };
    let Ok(name) = std::str::from_utf8(name_bytes) else {
        return -1;
    };
    let message_bytes = unsafe { std::slice::from_raw_parts(message, message_len) };
    let Ok(message) = Message::from_bytes(message_bytes) else {
        return -1;
    };
    match broker.publish(name, message) {
        Ok(()) => 0,
        Err(_) => -1,
    }
}
