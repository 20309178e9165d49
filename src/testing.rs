//! An in-process stand-in for hostfxr and the managed payload.
//!
//! Every export and "managed" member is a plain Rust function that records
//! what it saw in thread-local state, so each test thread gets its own
//! isolated fake.

use std::cell::RefCell;
use std::mem;
use std::os::raw::c_void;
use std::ptr::{self, NonNull};

use crate::exports::{DelegateKind, HostfxrExports, HostfxrHandle, InitializeParameters};
use crate::hostfxr::Hostfxr;
use crate::invoke::{ComponentEntryPointFn, NumericCallbackFn, PlainCallbackFn, TextCallbackFn};
use crate::loader::{AssemblyDelegateLoader, LoadAssemblyAndGetFunctionPointerFn, UNMANAGED_CALLERS_ONLY_METHOD};
use crate::pdstring::{self, PdChar};

pub use crate::scenario::LibArgs;

pub const TYPE_NAME: &str = "DotNetLib.Lib, DotNetLib";
pub const DELEGATE_TYPE_NAME: &str = "DotNetLib.Lib+CustomEntryPointDelegate, DotNetLib";
const MISSING_METHOD: i32 = 0x8013_1513_u32 as i32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discriminator {
    Null,
    UnmanagedCallersOnly,
    Named(String),
}

struct FakeState {
    close_count: usize,
    init_result: (i32, bool),
    delegate_result: (i32, bool),
    run_app_exit_code: i32,
    last_config_path: Option<String>,
    last_argv: Vec<String>,
    last_delegate_kind: Option<i32>,
    last_discriminator: Option<Discriminator>,
    resolve_writes_pointer_on_failure: bool,
    text_input: String,
    managed_log: Vec<String>,
}

impl Default for FakeState {
    fn default() -> FakeState {
        FakeState {
            close_count: 0,
            init_result: (0, true),
            delegate_result: (0, false),
            run_app_exit_code: 0,
            last_config_path: None,
            last_argv: Vec::new(),
            last_delegate_kind: None,
            last_discriminator: None,
            resolve_writes_pointer_on_failure: false,
            text_input: "String from managed".to_string(),
            managed_log: Vec::new(),
        }
    }
}

thread_local! {
    static STATE: RefCell<FakeState> = RefCell::new(FakeState::default());
}

fn with_state<R>(f: impl FnOnce(&mut FakeState) -> R) -> R {
    STATE.with(|state| f(&mut state.borrow_mut()))
}

/// Resets the fake for the current test and again when dropped.
pub struct FakeHost;

impl FakeHost {
    pub fn install() -> FakeHost {
        with_state(|state| *state = FakeState::default());
        FakeHost
    }
}

impl Drop for FakeHost {
    fn drop(&mut self) {
        with_state(|state| *state = FakeState::default());
    }
}

pub fn set_init_result(code: i32, produce_handle: bool) {
    with_state(|state| state.init_result = (code, produce_handle));
}

pub fn set_delegate_result(code: i32, null_delegate: bool) {
    with_state(|state| state.delegate_result = (code, null_delegate));
}

pub fn set_run_app_exit_code(code: i32) {
    with_state(|state| state.run_app_exit_code = code);
}

pub fn set_resolve_writes_pointer_on_failure(enabled: bool) {
    with_state(|state| state.resolve_writes_pointer_on_failure = enabled);
}

pub fn set_text_input(input: &str) {
    with_state(|state| state.text_input = input.to_string());
}

pub fn close_count() -> usize {
    with_state(|state| state.close_count)
}

pub fn last_config_path() -> Option<String> {
    with_state(|state| state.last_config_path.clone())
}

pub fn last_argv() -> Vec<String> {
    with_state(|state| state.last_argv.clone())
}

pub fn last_delegate_kind() -> Option<i32> {
    with_state(|state| state.last_delegate_kind)
}

pub fn last_discriminator() -> Discriminator {
    with_state(|state| state.last_discriminator.clone()).unwrap_or(Discriminator::Null)
}

pub fn managed_log() -> Vec<String> {
    with_state(|state| state.managed_log.clone())
}

fn record(line: String) {
    with_state(|state| state.managed_log.push(line));
}

fn fake_handle() -> HostfxrHandle {
    NonNull::<u64>::dangling().as_ptr() as HostfxrHandle
}

unsafe fn read(ptr: *const PdChar) -> String {
    pdstring::decode(ptr)
}

pub fn exports() -> HostfxrExports {
    unsafe {
        HostfxrExports::from_raw(
            Some(fake_initialize_for_dotnet_command_line),
            fake_initialize_for_runtime_config,
            fake_get_runtime_delegate,
            Some(fake_run_app),
            fake_close,
        )
    }
}

pub fn hostfxr() -> Hostfxr {
    Hostfxr::from_exports("/fake/libhostfxr.so", exports())
}

pub fn hostfxr_without_command_line() -> Hostfxr {
    let exports = unsafe {
        HostfxrExports::from_raw(
            None,
            fake_initialize_for_runtime_config,
            fake_get_runtime_delegate,
            None,
            fake_close,
        )
    };
    Hostfxr::from_exports("/fake/libhostfxr.so", exports)
}

pub fn loader() -> AssemblyDelegateLoader {
    AssemblyDelegateLoader::new(fake_load_assembly_and_get_function_pointer)
}

unsafe extern "C" fn fake_initialize_for_dotnet_command_line(
    argc: i32,
    argv: *const *const PdChar,
    _parameters: *const InitializeParameters,
    handle: *mut HostfxrHandle,
) -> i32 {
    let args = (0..argc as usize).map(|i| read(*argv.add(i))).collect();
    let (code, produce_handle) = with_state(|state| {
        state.last_argv = args;
        state.init_result
    });
    if produce_handle {
        *handle = fake_handle();
    }
    code
}

unsafe extern "C" fn fake_initialize_for_runtime_config(
    runtime_config_path: *const PdChar,
    _parameters: *const InitializeParameters,
    handle: *mut HostfxrHandle,
) -> i32 {
    let path = read(runtime_config_path);
    let (code, produce_handle) = with_state(|state| {
        state.last_config_path = Some(path);
        state.init_result
    });
    if produce_handle {
        *handle = fake_handle();
    }
    code
}

unsafe extern "C" fn fake_get_runtime_delegate(
    _handle: HostfxrHandle,
    kind: DelegateKind,
    delegate: *mut *mut c_void,
) -> i32 {
    let (code, null_delegate) = with_state(|state| {
        state.last_delegate_kind = Some(kind as i32);
        state.delegate_result
    });
    if !null_delegate {
        *delegate = fake_load_assembly_and_get_function_pointer as LoadAssemblyAndGetFunctionPointerFn as *mut c_void;
    }
    code
}

unsafe extern "C" fn fake_run_app(_handle: HostfxrHandle) -> i32 {
    with_state(|state| state.run_app_exit_code)
}

unsafe extern "C" fn fake_close(_handle: HostfxrHandle) -> i32 {
    with_state(|state| state.close_count += 1);
    0
}

unsafe extern "system" fn fake_load_assembly_and_get_function_pointer(
    _assembly_path: *const PdChar,
    _type_name: *const PdChar,
    method_name: *const PdChar,
    delegate_type_name: *const PdChar,
    _reserved: *mut c_void,
    delegate: *mut *mut c_void,
) -> i32 {
    let discriminator = if delegate_type_name.is_null() {
        Discriminator::Null
    } else if delegate_type_name == UNMANAGED_CALLERS_ONLY_METHOD {
        Discriminator::UnmanagedCallersOnly
    } else {
        Discriminator::Named(read(delegate_type_name))
    };
    let method = read(method_name);
    let member = match (method.as_str(), &discriminator) {
        ("Hello", Discriminator::Null) => Some(hello as ComponentEntryPointFn as *mut c_void),
        ("CustomEntryPointUnmanagedCallersOnly", Discriminator::UnmanagedCallersOnly) => {
            Some(custom_entry_point_unmanaged_callers_only as unsafe extern "system" fn(LibArgs) as *mut c_void)
        }
        ("CustomEntryPoint", Discriminator::Named(name)) if name == DELEGATE_TYPE_NAME => {
            Some(custom_entry_point as unsafe extern "system" fn(LibArgs) as *mut c_void)
        }
        ("TestFnPtr", Discriminator::UnmanagedCallersOnly) => {
            Some(test_fn_ptr as extern "system" fn(PlainCallbackFn) as *mut c_void)
        }
        ("TestFnPtrWithArgs", Discriminator::UnmanagedCallersOnly) => {
            Some(test_fn_ptr_with_args as extern "system" fn(NumericCallbackFn) as *mut c_void)
        }
        ("TestStringInputOutput", Discriminator::UnmanagedCallersOnly) => {
            Some(test_string_input_output as extern "system" fn(TextCallbackFn) as *mut c_void)
        }
        _ => None,
    };
    let writes_on_failure = with_state(|state| {
        state.last_discriminator = Some(discriminator);
        state.resolve_writes_pointer_on_failure
    });
    match member {
        Some(pointer) => {
            *delegate = pointer;
            0
        }
        None => {
            if writes_on_failure {
                *delegate = hello as ComponentEntryPointFn as *mut c_void;
            }
            MISSING_METHOD
        }
    }
}

unsafe extern "system" fn hello(args: *mut c_void, size: i32) -> i32 {
    if (size as usize) < mem::size_of::<LibArgs>() {
        return 1;
    }
    let args = ptr::read(args as *const LibArgs);
    record(format!("Hello {} {}", read(args.message), args.number));
    0
}

unsafe extern "system" fn custom_entry_point_unmanaged_callers_only(args: LibArgs) {
    record(format!("CustomEntryPointUnmanagedCallersOnly {} {}", read(args.message), args.number));
}

unsafe extern "system" fn custom_entry_point(args: LibArgs) {
    record(format!("CustomEntryPoint {} {}", read(args.message), args.number));
}

extern "system" fn test_fn_ptr(callback: PlainCallbackFn) {
    record("TestFnPtr".to_string());
    callback();
}

extern "system" fn test_fn_ptr_with_args(callback: NumericCallbackFn) {
    let returned = callback(20);
    record(format!("TestFnPtrWithArgs got {}", returned));
}

extern "system" fn test_string_input_output(callback: TextCallbackFn) {
    let input = pdstring::encode(&with_state(|state| state.text_input.clone())).expect("fake input encodes");
    let returned = callback(input.as_ptr());
    let text = if returned.is_null() {
        "<null>".to_string()
    } else {
        unsafe { read(returned) }
    };
    record(format!("TestStringInputOutput got {}", text));
}
