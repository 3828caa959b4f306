//! The process-wide loader registry (spec.md §4.3): a lazily-initialised
//! `name → Loader` map the gateway consults to resolve a configuration
//! entry's `loader` field into a concrete [`Loader`] implementation.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::loader::error::LoaderError;
use crate::loader::native::NativeLoader;
use crate::loader::out_of_process::OutOfProcessLoader;
use crate::loader::traits::Loader;
use crate::loader::types::LoaderType;

/// One entry of the optional `initialize_from_json` augmentation array
/// (spec.md §4.3, SPEC_FULL.md §B): `{ type, name, configuration }`. The
/// `configuration` field is presently unused by the built-in loaders — it
/// is accepted and threaded through so a future loader implementation (or
/// one of the optional managed-runtime variants) has somewhere to read its
/// own base configuration from.
#[derive(Debug, Clone, Deserialize)]
pub struct LoaderRegistryEntry {
    #[serde(rename = "type")]
    pub loader_type: LoaderType,
    pub name: String,
    #[serde(default)]
    pub configuration: Value,
}

/// A process-wide, lazily-initialised mapping from loader name to loader
/// implementation. The gateway calls [`LoaderRegistry::initialize`] during
/// `Gateway::create` and [`LoaderRegistry::destroy`] when it tears down
/// (spec.md §4.3's lifetime note: "the registry lives as long as any
/// gateway exists").
pub struct LoaderRegistry {
    loaders: dashmap::DashMap<String, Arc<dyn Loader>>,
    initialized: std::sync::atomic::AtomicBool,
}

impl Default for LoaderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl LoaderRegistry {
    /// Builds an empty, uninitialized registry. Most callers want
    /// [`LoaderRegistry::initialize`] immediately after.
    pub fn new() -> Self {
        Self {
            loaders: dashmap::DashMap::new(),
            initialized: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Populates the registry with the built-in loaders (native, and
    /// out-of-process since this crate ships one). Idempotent — calling it
    /// again is a no-op.
    pub fn initialize(&self) {
        use std::sync::atomic::Ordering;
        if self.initialized.swap(true, Ordering::AcqRel) {
            return;
        }
        self.register(Arc::new(NativeLoader::new("native")));
        self.register(Arc::new(OutOfProcessLoader::new("out_of_process")));
        info!("loader registry initialized with built-in loaders");
    }

    /// Augments (or overrides) the registry from a configuration array, each
    /// entry naming a loader type, a registration name, and loader-specific
    /// configuration (spec.md §4.3). Must be called after
    /// [`LoaderRegistry::initialize`].
    pub fn initialize_from_json(&self, entries: &[LoaderRegistryEntry]) -> Result<(), LoaderError> {
        for entry in entries {
            let loader: Arc<dyn Loader> = match entry.loader_type {
                LoaderType::Native => Arc::new(NativeLoader::new(entry.name.clone())),
                LoaderType::OutOfProcess => Arc::new(OutOfProcessLoader::new(entry.name.clone())),
                LoaderType::ManagedA | LoaderType::ManagedB | LoaderType::Interpreted => {
                    return Err(LoaderError::InvalidConfiguration {
                        loader: entry.name.clone(),
                        reason: format!(
                            "{:?} is an optional-by-build loader type with no implementation in this build",
                            entry.loader_type
                        ),
                    });
                }
            };
            debug!(loader = %entry.name, loader_type = ?entry.loader_type, "loader registry entry overriding default");
            self.loaders.insert(entry.name.clone(), loader);
        }
        Ok(())
    }

    /// Registers (or overrides) a single loader by its own reported name.
    pub fn register(&self, loader: Arc<dyn Loader>) {
        self.loaders.insert(loader.name().to_string(), loader);
    }

    /// Looks up a loader by name.
    pub fn find_by_name(&self, name: &str) -> Option<Arc<dyn Loader>> {
        self.loaders.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Reverses [`LoaderRegistry::initialize`]: drops every registered
    /// loader, releasing any resources they opened at init time.
    pub fn destroy(&self) {
        use std::sync::atomic::Ordering;
        self.loaders.clear();
        self.initialized.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initialize_registers_native_loader() {
        let registry = LoaderRegistry::new();
        registry.initialize();
        assert!(registry.find_by_name("native").is_some());
        assert!(registry.find_by_name("out_of_process").is_some());
    }

    #[test]
    fn initialize_is_idempotent() {
        let registry = LoaderRegistry::new();
        registry.initialize();
        registry.initialize();
        assert!(registry.find_by_name("native").is_some());
    }

    #[test]
    fn find_by_name_misses_unregistered_loader() {
        let registry = LoaderRegistry::new();
        registry.initialize();
        assert!(registry.find_by_name("nope").is_none());
    }

    #[test]
    fn initialize_from_json_overrides_default_name() {
        let registry = LoaderRegistry::new();
        registry.initialize();
        registry
            .initialize_from_json(&[LoaderRegistryEntry {
                loader_type: LoaderType::Native,
                name: "native".to_string(),
                configuration: Value::Null,
            }])
            .expect("override succeeds");
        assert!(registry.find_by_name("native").is_some());
    }

    #[test]
    fn initialize_from_json_rejects_unimplemented_managed_runtime() {
        let registry = LoaderRegistry::new();
        registry.initialize();
        let err = registry
            .initialize_from_json(&[LoaderRegistryEntry {
                loader_type: LoaderType::ManagedA,
                name: "dotnet".to_string(),
                configuration: Value::Null,
            }])
            .unwrap_err();
        assert!(matches!(err, LoaderError::InvalidConfiguration { .. }));
    }

    #[test]
    fn destroy_clears_registrations() {
        let registry = LoaderRegistry::new();
        registry.initialize();
        registry.destroy();
        assert!(registry.find_by_name("native").is_none());
    }
}
