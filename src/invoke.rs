//! Calling resolved managed entry points.
//!
//! Each [`Invocation`] variant knows which [`Signature`] it must be resolved
//! under and how the resulting pointer is called, so callers pick a shape and
//! never touch the resolver or the pointer casts directly.
//!
//! Closures handed to managed code go through thread-local slots and
//! `extern "system"` trampolines. Managed code calls them back on the thread
//! that made the invocation, so the slot installed for the duration of the
//! call is always the right one.

use std::cell::RefCell;
use std::mem;
use std::os::raw::c_void;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::ptr;
use std::thread::LocalKey;

use log::{debug, error, warn};

use crate::error::{HostError, Result};
use crate::loader::{AssemblyDelegateLoader, EntryPointDescriptor, Signature};
use crate::pdstring::{self, PdCString, PdChar};

/// `component_entry_point_fn`.
pub type ComponentEntryPointFn = unsafe extern "system" fn(args: *mut c_void, size: i32) -> i32;
pub type PlainCallbackFn = extern "system" fn();
pub type NumericCallbackFn = extern "system" fn(i32) -> f64;
pub type TextCallbackFn = extern "system" fn(*const PdChar) -> *const PdChar;

type NumericClosure = Box<dyn FnMut(i32) -> f64>;
type TextClosure = Box<dyn FnMut(String) -> String>;

thread_local! {
    static NUMERIC_CALLBACK: RefCell<Option<NumericClosure>> = RefCell::new(None);
    static TEXT_CALLBACK: RefCell<Option<TextClosure>> = RefCell::new(None);
    static TEXT_RETURN: RefCell<Option<PdCString>> = RefCell::new(None);
}

/// Where a managed member lives.
#[derive(Debug, Clone, Copy)]
pub struct EntryPointTarget<'a> {
    pub assembly_path: &'a Path,
    pub type_name: &'a str,
    pub method_name: &'a str,
}

/// Native code exposed to a managed member that takes a function pointer.
pub enum Callback {
    /// `delegate*<void>`.
    Plain(PlainCallbackFn),
    /// `delegate* unmanaged<int, double>`.
    Numeric(NumericClosure),
    /// `delegate* unmanaged<IntPtr, IntPtr>` carrying platform strings.
    ///
    /// The returned string stays valid until the next text callback on the
    /// same thread or the end of the invocation; managed code must copy it.
    Text(TextClosure),
}

impl Callback {
    pub fn numeric<F: FnMut(i32) -> f64 + 'static>(callback: F) -> Callback {
        Callback::Numeric(Box::new(callback))
    }

    pub fn text<F: FnMut(String) -> String + 'static>(callback: F) -> Callback {
        Callback::Text(Box::new(callback))
    }
}

/// The supported call shapes. `A` is the `#[repr(C)]` argument struct.
pub enum Invocation<A> {
    /// `int (*)(A*, int32_t size)`, called once per payload in order.
    Default(Vec<A>),
    /// `void (*)(A)` on an `[UnmanagedCallersOnly]` member.
    UnmanagedOnly(A),
    /// `void (*)(A)` bound through a managed delegate type.
    CustomDelegate { delegate_type: String, args: A },
    /// `void (*)(callback)` on an `[UnmanagedCallersOnly]` member.
    Callback(Callback),
}

impl<A> Invocation<A> {
    pub fn shape(&self) -> &'static str {
        match self {
            Invocation::Default(_) => "default",
            Invocation::UnmanagedOnly(_) => "unmanaged-only",
            Invocation::CustomDelegate { .. } => "custom-delegate",
            Invocation::Callback(_) => "callback-passing",
        }
    }

    pub fn signature(&self, method: &str) -> Result<Signature> {
        Ok(match self {
            Invocation::Default(_) => Signature::Default,
            Invocation::UnmanagedOnly(_) | Invocation::Callback(_) => Signature::UnmanagedCallersOnly,
            Invocation::CustomDelegate { delegate_type, .. } => {
                if delegate_type.trim().is_empty() {
                    return Err(HostError::InvalidSignature {
                        method: method.to_string(),
                        shape: self.shape(),
                    });
                }
                Signature::Delegate(pdstring::encode(delegate_type.as_str())?)
            }
        })
    }
}

impl Invocation<()> {
    pub fn callback(callback: Callback) -> Invocation<()> {
        Invocation::Callback(callback)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationOutcome {
    /// The managed return value of every default-shape call.
    Default(Vec<i32>),
    Completed,
}

/// Resolves `target` under the signature `invocation` needs and calls it.
///
/// # Safety
/// The managed member must actually have the native signature implied by the
/// invocation shape and `A`, and `A` must be `#[repr(C)]` with the managed
/// struct's layout. None of this can be checked at runtime.
pub unsafe fn invoke<A: Copy>(
    loader: &AssemblyDelegateLoader,
    target: &EntryPointTarget<'_>,
    invocation: Invocation<A>,
) -> Result<InvocationOutcome> {
    let signature = invocation.signature(target.method_name)?;
    let descriptor = EntryPointDescriptor::new(target.assembly_path, target.type_name, target.method_name, signature)?;
    let pointer = loader.resolve(&descriptor)?;
    debug!("invoking {} as {}", target.method_name, invocation.shape());

    match invocation {
        Invocation::Default(payloads) => {
            let entry_point = pointer.cast::<ComponentEntryPointFn>();
            let size = mem::size_of::<A>() as i32;
            let mut results = Vec::with_capacity(payloads.len());
            for mut payload in payloads {
                let code = (*entry_point)(&mut payload as *mut A as *mut c_void, size);
                if code != 0 {
                    warn!("{} returned {}", target.method_name, code);
                }
                results.push(code);
            }
            Ok(InvocationOutcome::Default(results))
        }
        Invocation::UnmanagedOnly(args) | Invocation::CustomDelegate { args, .. } => {
            let entry_point = pointer.cast::<unsafe extern "system" fn(A)>();
            (*entry_point)(args);
            Ok(InvocationOutcome::Completed)
        }
        Invocation::Callback(Callback::Plain(callback)) => {
            let entry_point = pointer.cast::<unsafe extern "system" fn(PlainCallbackFn)>();
            (*entry_point)(callback);
            Ok(InvocationOutcome::Completed)
        }
        Invocation::Callback(Callback::Numeric(callback)) => {
            let entry_point = pointer.cast::<unsafe extern "system" fn(NumericCallbackFn)>();
            let _installed = Installed::new(&NUMERIC_CALLBACK, callback);
            (*entry_point)(numeric_trampoline);
            Ok(InvocationOutcome::Completed)
        }
        Invocation::Callback(Callback::Text(callback)) => {
            let entry_point = pointer.cast::<unsafe extern "system" fn(TextCallbackFn)>();
            let _installed = Installed::new(&TEXT_CALLBACK, callback);
            let _buffer = ReturnBuffer;
            (*entry_point)(text_trampoline);
            Ok(InvocationOutcome::Completed)
        }
    }
}

/// Keeps a closure in its slot for one invocation, restoring whatever an
/// outer invocation had installed.
struct Installed<T: 'static> {
    slot: &'static LocalKey<RefCell<Option<T>>>,
    previous: Option<T>,
}

impl<T: 'static> Installed<T> {
    fn new(slot: &'static LocalKey<RefCell<Option<T>>>, value: T) -> Installed<T> {
        let previous = slot.with(|cell| cell.replace(Some(value)));
        Installed { slot, previous }
    }
}

impl<T: 'static> Drop for Installed<T> {
    fn drop(&mut self) {
        let previous = self.previous.take();
        self.slot.with(|cell| {
            cell.replace(previous);
        });
    }
}

struct ReturnBuffer;

impl Drop for ReturnBuffer {
    fn drop(&mut self) {
        TEXT_RETURN.with(|cell| cell.borrow_mut().take());
    }
}

/// Takes the closure out of `slot` while it runs so a nested invocation can
/// install its own, then puts it back.
fn dispatch<T: 'static, R>(
    slot: &'static LocalKey<RefCell<Option<T>>>,
    name: &str,
    call: impl FnOnce(&mut T) -> R,
) -> Option<R> {
    let mut callback = match slot.with(|cell| cell.borrow_mut().take()) {
        Some(callback) => callback,
        None => {
            error!("{} callback invoked with no closure installed", name);
            return None;
        }
    };
    let result = panic::catch_unwind(AssertUnwindSafe(|| call(&mut callback)));
    slot.with(|cell| {
        let mut cell = cell.borrow_mut();
        if cell.is_none() {
            *cell = Some(callback);
        }
    });
    match result {
        Ok(value) => Some(value),
        Err(_) => {
            error!("{} callback panicked", name);
            None
        }
    }
}

extern "system" fn numeric_trampoline(value: i32) -> f64 {
    dispatch(&NUMERIC_CALLBACK, "numeric", |callback| callback(value)).unwrap_or(0.0)
}

extern "system" fn text_trampoline(input: *const PdChar) -> *const PdChar {
    let input = if input.is_null() {
        String::new()
    } else {
        unsafe { pdstring::decode(input) }
    };
    let output = match dispatch(&TEXT_CALLBACK, "text", |callback| callback(input)) {
        Some(output) => output,
        None => return ptr::null(),
    };
    match pdstring::encode(output.as_str()) {
        Ok(output) => TEXT_RETURN.with(|cell| {
            let mut cell = cell.borrow_mut();
            *cell = Some(output);
            cell.as_ref().map_or(ptr::null(), |output| output.as_ptr())
        }),
        Err(err) => {
            error!("text callback returned an unencodable string: {}", err);
            ptr::null()
        }
    }
}
