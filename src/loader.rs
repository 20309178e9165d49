//! Resolving managed members to native function pointers.

use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::ops::Deref;
use std::os::raw::c_void;
use std::path::Path;
use std::ptr::{self, NonNull};

use log::{debug, error};

use crate::error::{HostError, Result};
use crate::pdstring::{self, PdCString, PdChar};
use crate::status::StatusCode;

/// `load_assembly_and_get_function_pointer_fn`.
pub type LoadAssemblyAndGetFunctionPointerFn = unsafe extern "system" fn(
    assembly_path: *const PdChar,
    type_name: *const PdChar,
    method_name: *const PdChar,
    delegate_type_name: *const PdChar,
    reserved: *mut c_void,
    delegate: *mut *mut c_void,
) -> i32;

/// `UNMANAGEDCALLERSONLY_METHOD`: `(const char_t*)-1`.
pub const UNMANAGED_CALLERS_ONLY_METHOD: *const PdChar = usize::MAX as *const PdChar;

/// Selects how the runtime binds the resolved member.
pub enum Signature {
    /// `int (*)(void* args, int32_t size)`.
    Default,
    /// The member carries `[UnmanagedCallersOnly]`; no marshaling metadata.
    UnmanagedCallersOnly,
    /// Marshaling is described by the named managed delegate type.
    Delegate(PdCString),
}

impl Signature {
    fn delegate_type_name(&self) -> *const PdChar {
        match self {
            Signature::Default => ptr::null(),
            Signature::UnmanagedCallersOnly => UNMANAGED_CALLERS_ONLY_METHOD,
            Signature::Delegate(name) => name.as_ptr(),
        }
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signature::Default => f.write_str("Default"),
            Signature::UnmanagedCallersOnly => f.write_str("UnmanagedCallersOnly"),
            Signature::Delegate(name) => f.debug_tuple("Delegate").field(&name.to_string_lossy()).finish(),
        }
    }
}

/// Identifies one managed callable.
pub struct EntryPointDescriptor {
    pub assembly_path: PdCString,
    pub type_name: PdCString,
    pub method_name: PdCString,
    pub signature: Signature,
}

impl EntryPointDescriptor {
    pub fn new(assembly_path: &Path, type_name: &str, method_name: &str, signature: Signature) -> Result<EntryPointDescriptor> {
        Ok(EntryPointDescriptor {
            assembly_path: pdstring::encode(assembly_path)?,
            type_name: pdstring::encode(type_name)?,
            method_name: pdstring::encode(method_name)?,
            signature,
        })
    }

    fn member(&self) -> String {
        format!(
            "{}::{}",
            self.type_name.to_string_lossy(),
            self.method_name.to_string_lossy()
        )
    }
}

impl fmt::Debug for EntryPointDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryPointDescriptor")
            .field("assembly_path", &self.assembly_path.to_string_lossy())
            .field("type_name", &self.type_name.to_string_lossy())
            .field("method_name", &self.method_name.to_string_lossy())
            .field("signature", &self.signature)
            .finish()
    }
}

/// A resolved pointer with no signature attached yet.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct RawFunctionPointer(NonNull<c_void>);

impl RawFunctionPointer {
    pub fn as_ptr(self) -> *mut c_void {
        self.0.as_ptr()
    }

    /// Attaches a signature.
    ///
    /// # Safety
    /// `T` must be an `extern` function pointer type matching the ABI the
    /// member was resolved against. Nothing checks this at runtime.
    pub unsafe fn cast<T: Copy>(self) -> ManagedFunction<T> {
        ManagedFunction {
            managed_pointer: self.0.as_ptr(),
            phantom: PhantomData,
        }
    }
}

impl fmt::Debug for RawFunctionPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawFunctionPointer({:p})", self.0)
    }
}

/// A managed entry point callable as the function pointer type `T`.
pub struct ManagedFunction<T> {
    managed_pointer: *mut c_void,
    phantom: PhantomData<T>,
}

impl<T> Deref for ManagedFunction<T> {
    type Target = T;
    fn deref(&self) -> &T {
        debug_assert_eq!(mem::size_of::<T>(), mem::size_of::<*mut c_void>());
        unsafe { &*(&self.managed_pointer as *const *mut c_void as *const T) }
    }
}

impl<T> fmt::Debug for ManagedFunction<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ManagedFunction({:p})", self.managed_pointer)
    }
}

/// The runtime's "load assembly and get function pointer" delegate.
///
/// Write-once: it is obtained from a closed context and then shared for the
/// rest of the process. Concurrent read-only use is fine once obtained.
#[derive(Clone, Copy)]
pub struct AssemblyDelegateLoader {
    load_assembly_and_get_function_pointer: LoadAssemblyAndGetFunctionPointerFn,
}

unsafe impl Send for AssemblyDelegateLoader {}
unsafe impl Sync for AssemblyDelegateLoader {}

impl AssemblyDelegateLoader {
    pub fn new(load_assembly_and_get_function_pointer: LoadAssemblyAndGetFunctionPointerFn) -> AssemblyDelegateLoader {
        AssemblyDelegateLoader {
            load_assembly_and_get_function_pointer,
        }
    }

    /// Loads the assembly if needed and returns a pointer to the member.
    ///
    /// A non-zero status never comes back with a pointer, and a zero status
    /// with a null pointer is treated as a failure.
    pub fn resolve(&self, descriptor: &EntryPointDescriptor) -> Result<RawFunctionPointer> {
        let mut delegate = ptr::null_mut();
        let code = StatusCode(unsafe {
            (self.load_assembly_and_get_function_pointer)(
                descriptor.assembly_path.as_ptr(),
                descriptor.type_name.as_ptr(),
                descriptor.method_name.as_ptr(),
                descriptor.signature.delegate_type_name(),
                ptr::null_mut(),
                &mut delegate,
            )
        });
        match NonNull::new(delegate) {
            Some(pointer) if code.is_success() => {
                debug!("resolved {}", descriptor.member());
                Ok(RawFunctionPointer(pointer))
            }
            _ => {
                error!("Failure: load_assembly_and_get_function_pointer({}): {}", descriptor.member(), code);
                Err(HostError::Resolution {
                    type_name: descriptor.type_name.to_string_lossy().into(),
                    method: descriptor.method_name.to_string_lossy().into(),
                    code,
                })
            }
        }
    }
}

impl fmt::Debug for AssemblyDelegateLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AssemblyDelegateLoader({:p})",
            self.load_assembly_and_get_function_pointer as *const c_void
        )
    }
}
