//! The short-lived hostfxr execution context.
//!
//! A context only exists long enough to pull the
//! `load_assembly_and_get_function_pointer` delegate out of it. [`HostContext`]
//! closes the handle on drop, so every path through
//! [`Hostfxr::initialize_for_runtime_config`] closes it exactly once.

use std::os::raw::c_void;
use std::path::Path;
use std::ptr;

use log::{debug, error, warn};

use crate::error::{HostError, Result};
use crate::exports::{self, DelegateKind, HostfxrExports, HostfxrHandle};
use crate::hostfxr::Hostfxr;
use crate::loader::{AssemblyDelegateLoader, LoadAssemblyAndGetFunctionPointerFn};
use crate::pdstring;
use crate::status::StatusCode;

pub(crate) struct HostContext<'h> {
    exports: &'h HostfxrExports,
    handle: HostfxrHandle,
}

impl<'h> HostContext<'h> {
    /// Takes ownership of `handle`; a null handle has nothing to close.
    pub(crate) fn adopt(exports: &'h HostfxrExports, handle: HostfxrHandle) -> Option<HostContext<'h>> {
        if handle.is_null() {
            None
        } else {
            Some(HostContext { exports, handle })
        }
    }

    pub(crate) fn handle(&self) -> HostfxrHandle {
        self.handle
    }

    fn runtime_delegate(&self, kind: DelegateKind) -> (StatusCode, *mut c_void) {
        let mut delegate = ptr::null_mut();
        let code = unsafe { (self.exports.get_runtime_delegate())(self.handle, kind, &mut delegate) };
        (StatusCode(code), delegate)
    }
}

impl<'h> Drop for HostContext<'h> {
    fn drop(&mut self) {
        let code = StatusCode(unsafe { (self.exports.close())(self.handle) });
        if code.is_success() {
            debug!("host context closed");
        } else {
            warn!("Close failed: {}", code);
        }
    }
}

impl Hostfxr {
    /// Initializes the runtime from a `*.runtimeconfig.json` and returns the
    /// long-lived delegate loader. The context itself is closed before this
    /// returns, whether or not the delegate could be acquired.
    pub fn initialize_for_runtime_config(&self, config_path: &Path) -> Result<AssemblyDelegateLoader> {
        let config = pdstring::encode(config_path)?;
        let (host_path, dotnet_root) = self.options().encode()?;
        let parameters = exports::parameters(&host_path, &dotnet_root);
        let parameters_ptr = if self.options().is_empty() { ptr::null() } else { &parameters as *const _ };

        let mut handle = ptr::null_mut();
        let code = StatusCode(unsafe {
            (self.exports().initialize_for_runtime_config())(config.as_ptr(), parameters_ptr, &mut handle)
        });
        let context = match HostContext::adopt(self.exports(), handle) {
            Some(context) if code.is_success() => context,
            _ => {
                error!("Init failed: {}", code);
                return Err(HostError::Initialization {
                    path: config_path.to_path_buf(),
                    code,
                });
            }
        };
        debug!("runtime initialized from {}", config_path.display());

        let (code, delegate) = context.runtime_delegate(DelegateKind::LoadAssemblyAndGetFunctionPointer);
        drop(context);
        if !code.is_success() || delegate.is_null() {
            error!("Get delegate failed: {}", code);
            return Err(HostError::DelegateAcquisition(code));
        }

        let load_assembly_and_get_function_pointer =
            unsafe { std::mem::transmute::<*mut c_void, LoadAssemblyAndGetFunctionPointerFn>(delegate) };
        Ok(AssemblyDelegateLoader::new(load_assembly_and_get_function_pointer))
    }
}
