//! Hosting the .NET runtime from a native Rust process.
//!
//! The flow is strictly sequential:
//!
//! 1. [`Hostfxr::locate_and_load`] finds hostfxr through a [`HostfxrLocator`]
//!    and validates its exports once.
//! 2. [`Hostfxr::initialize_for_runtime_config`] initializes a context from a
//!    `*.runtimeconfig.json`, pulls the `load_assembly_and_get_function_pointer`
//!    delegate out of it and closes the context again.
//! 3. [`AssemblyDelegateLoader::resolve`] turns an [`EntryPointDescriptor`]
//!    into a function pointer.
//! 4. [`invoke()`] calls it under one of the supported [`Invocation`] shapes,
//!    possibly handing native callbacks to managed code.

pub mod config;
mod context;
pub mod error;
pub mod exports;
pub mod hostfxr;
pub mod invoke;
pub mod library;
pub mod loader;
pub mod locator;
pub mod logging;
pub mod native_api;
pub mod pdstring;
pub mod scenario;
pub mod status;

#[cfg(test)]
mod testing;

pub use config::{FailurePolicy, HostConfig};
pub use error::{HostError, Result};
pub use exports::{DelegateKind, HostfxrExports, InitializeOptions};
pub use hostfxr::Hostfxr;
pub use invoke::{invoke, Callback, EntryPointTarget, Invocation, InvocationOutcome};
pub use library::NativeLibrary;
pub use loader::{AssemblyDelegateLoader, EntryPointDescriptor, ManagedFunction, RawFunctionPointer, Signature};
pub use locator::{FixedLocator, HostfxrLocator, NethostLocator};
pub use pdstring::{PdCStr, PdCString, PdChar};
pub use status::StatusCode;
