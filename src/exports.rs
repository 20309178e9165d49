//! The hostfxr ABI and the typed table of its exports.

use std::os::raw::c_void;
use std::path::{Path, PathBuf};
use std::ptr;

use log::debug;

use crate::error::Result;
use crate::library::NativeLibrary;
use crate::pdstring::{self, PdCString, PdChar};

/// Opaque `hostfxr_handle`.
pub type HostfxrHandle = *mut c_void;

pub type InitializeForDotnetCommandLineFn = unsafe extern "C" fn(
    argc: i32,
    argv: *const *const PdChar,
    parameters: *const InitializeParameters,
    host_context_handle: *mut HostfxrHandle,
) -> i32;
pub type InitializeForRuntimeConfigFn = unsafe extern "C" fn(
    runtime_config_path: *const PdChar,
    parameters: *const InitializeParameters,
    host_context_handle: *mut HostfxrHandle,
) -> i32;
pub type GetRuntimeDelegateFn =
    unsafe extern "C" fn(host_context_handle: HostfxrHandle, kind: DelegateKind, delegate: *mut *mut c_void) -> i32;
pub type RunAppFn = unsafe extern "C" fn(host_context_handle: HostfxrHandle) -> i32;
pub type CloseFn = unsafe extern "C" fn(host_context_handle: HostfxrHandle) -> i32;

/// `hostfxr_delegate_type`.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelegateKind {
    ComActivation = 0,
    LoadInMemoryAssembly = 1,
    WinrtActivation = 2,
    ComRegister = 3,
    ComUnregister = 4,
    LoadAssemblyAndGetFunctionPointer = 5,
    GetFunctionPointer = 6,
    LoadAssembly = 7,
    LoadAssemblyBytes = 8,
}

/// `hostfxr_initialize_parameters`.
#[repr(C)]
#[derive(Debug)]
pub struct InitializeParameters {
    pub size: usize,
    pub host_path: *const PdChar,
    pub dotnet_root: *const PdChar,
}

/// Owned backing storage for [`InitializeParameters`].
#[derive(Debug, Clone, Default)]
pub struct InitializeOptions {
    pub host_path: Option<PathBuf>,
    pub dotnet_root: Option<PathBuf>,
}

impl InitializeOptions {
    pub fn is_empty(&self) -> bool {
        self.host_path.is_none() && self.dotnet_root.is_none()
    }

    /// Encodes the options; the returned strings must outlive the parameters.
    pub(crate) fn encode(&self) -> Result<(Option<PdCString>, Option<PdCString>)> {
        let host_path = self.host_path.as_deref().map(pdstring::encode).transpose()?;
        let dotnet_root = self.dotnet_root.as_deref().map(pdstring::encode).transpose()?;
        Ok((host_path, dotnet_root))
    }
}

pub(crate) fn parameters(host_path: &Option<PdCString>, dotnet_root: &Option<PdCString>) -> InitializeParameters {
    InitializeParameters {
        size: std::mem::size_of::<InitializeParameters>(),
        host_path: host_path.as_ref().map_or(ptr::null(), |path| path.as_ptr()),
        dotnet_root: dotnet_root.as_ref().map_or(ptr::null(), |root| root.as_ptr()),
    }
}

/// The five hostfxr entry points, validated once when the library is loaded.
///
/// The three exports needed to hand out delegates are mandatory; the command
/// line pair is best-effort and may be absent on older hosts.
#[derive(Debug, Clone, Copy)]
pub struct HostfxrExports {
    initialize_for_dotnet_command_line: Option<InitializeForDotnetCommandLineFn>,
    initialize_for_runtime_config: InitializeForRuntimeConfigFn,
    get_runtime_delegate: GetRuntimeDelegateFn,
    run_app: Option<RunAppFn>,
    close: CloseFn,
}

impl HostfxrExports {
    pub const INITIALIZE_FOR_DOTNET_COMMAND_LINE: &'static str = "hostfxr_initialize_for_dotnet_command_line";
    pub const INITIALIZE_FOR_RUNTIME_CONFIG: &'static str = "hostfxr_initialize_for_runtime_config";
    pub const GET_RUNTIME_DELEGATE: &'static str = "hostfxr_get_runtime_delegate";
    pub const RUN_APP: &'static str = "hostfxr_run_app";
    pub const CLOSE: &'static str = "hostfxr_close";

    pub fn load(library: &NativeLibrary) -> Result<HostfxrExports> {
        let exports = unsafe {
            HostfxrExports {
                initialize_for_dotnet_command_line: library.lookup_optional(Self::INITIALIZE_FOR_DOTNET_COMMAND_LINE),
                initialize_for_runtime_config: library.lookup(Self::INITIALIZE_FOR_RUNTIME_CONFIG)?,
                get_runtime_delegate: library.lookup(Self::GET_RUNTIME_DELEGATE)?,
                run_app: library.lookup_optional(Self::RUN_APP),
                close: library.lookup(Self::CLOSE)?,
            }
        };
        debug!(
            "hostfxr exports loaded from {} (command line: {}, run app: {})",
            library.path().display(),
            exports.initialize_for_dotnet_command_line.is_some(),
            exports.run_app.is_some()
        );
        Ok(exports)
    }

    /// Builds a table from pointers obtained some other way, for example from
    /// a statically linked hostfxr.
    ///
    /// # Safety
    /// Every pointer must implement the corresponding hostfxr contract.
    pub unsafe fn from_raw(
        initialize_for_dotnet_command_line: Option<InitializeForDotnetCommandLineFn>,
        initialize_for_runtime_config: InitializeForRuntimeConfigFn,
        get_runtime_delegate: GetRuntimeDelegateFn,
        run_app: Option<RunAppFn>,
        close: CloseFn,
    ) -> HostfxrExports {
        HostfxrExports {
            initialize_for_dotnet_command_line,
            initialize_for_runtime_config,
            get_runtime_delegate,
            run_app,
            close,
        }
    }

    pub fn initialize_for_dotnet_command_line(&self) -> Option<InitializeForDotnetCommandLineFn> {
        self.initialize_for_dotnet_command_line
    }

    pub fn initialize_for_runtime_config(&self) -> InitializeForRuntimeConfigFn {
        self.initialize_for_runtime_config
    }

    pub fn get_runtime_delegate(&self) -> GetRuntimeDelegateFn {
        self.get_runtime_delegate
    }

    pub fn run_app(&self) -> Option<RunAppFn> {
        self.run_app
    }

    pub fn close(&self) -> CloseFn {
        self.close
    }

    pub(crate) fn missing(name: &'static str, library: &Path) -> crate::error::HostError {
        crate::error::HostError::MissingExport {
            name,
            path: library.to_path_buf(),
        }
    }
}
