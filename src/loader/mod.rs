//! The module loader abstraction (spec.md §4.3): a strategy for turning a
//! `(loader-type, entry-point, configuration)` triple into a live module
//! instance, plus the process-wide registry that resolves a loader by name.

pub mod error;
pub mod native;
pub mod out_of_process;
pub mod registry;
pub mod traits;
pub mod types;

pub use error::LoaderError;
pub use native::NativeLoader;
pub use out_of_process::OutOfProcessLoader;
pub use registry::{LoaderRegistry, LoaderRegistryEntry};
pub use traits::Loader;
pub use types::{LibraryHandle, LoaderType, NativeHostApi, NativeModuleApiTable};
