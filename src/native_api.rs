//! Functions the hosted payload P/Invokes back into (`__Internal`).
//!
//! The runtime looks these up in the main program handle, so the binary has to
//! be linked with its dynamic symbols exported (see `build.rs`). Nothing here
//! may panic: every entry point is reached from managed code.

use std::ffi::CStr;
use std::fmt;
use std::io::{self, Write};
use std::os::raw::{c_char, c_void};

use crate::pdstring::{self, PdChar};

/// `ComplicatedParamStruct` on the managed side.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComplicatedParams {
    pub some_option: i32,
    pub value_of_option: f64,
    pub do_complicated_thingy: bool,
}

impl fmt::Display for ComplicatedParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{ some_option: {}, value_of_option: {}, do_complicated_thingy: {} }}",
            self.some_option, self.value_of_option, self.do_complicated_thingy
        )
    }
}

#[no_mangle]
pub extern "C" fn print_simple_message() {
    say(format_args!("[native] A simple message from native code"));
}

#[no_mangle]
pub extern "C" fn print_int(value: i32) {
    say(format_args!("[native] print_int: {}", value));
}

#[no_mangle]
pub extern "C" fn print_float(value: f32) {
    say(format_args!("[native] print_float: {}", value));
}

/// # Safety
/// `params` must be null or point to a valid `ComplicatedParams`.
#[no_mangle]
pub unsafe extern "C" fn print_struct_pointer(params: *const ComplicatedParams) {
    say(format_args!("[native] print_struct_pointer: {}", describe_params(params.as_ref())));
}

#[no_mangle]
pub extern "C" fn print_struct_copy(params: ComplicatedParams) {
    say(format_args!("[native] print_struct_copy: {}", params));
}

/// # Safety
/// `params` must be null or point to a valid `ComplicatedParams`.
#[no_mangle]
pub unsafe extern "C" fn print_struct_reference(params: *mut ComplicatedParams) {
    say(format_args!("[native] print_struct_reference: {}", describe_params(params.as_ref())));
}

/// # Safety
/// `message` must be null or a nul-terminated UTF-8 string.
#[no_mangle]
pub unsafe extern "C" fn native_log(message: *const c_char) {
    say(format_args!("[native] native_log: {}", utf8_message(message)));
}

/// # Safety
/// `message` must be null or a nul-terminated platform string.
#[no_mangle]
pub unsafe extern "C" fn native_log_custom_marshalling(message: *const PdChar) {
    say(format_args!("[native] native_log_custom_marshalling: {}", platform_message(message)));
}

fn say(message: fmt::Arguments<'_>) {
    let _ = writeln!(io::stdout(), "{}", message);
}

fn describe_params(params: Option<&ComplicatedParams>) -> String {
    params.map_or_else(|| "<null>".to_string(), ToString::to_string)
}

unsafe fn utf8_message(message: *const c_char) -> String {
    if message.is_null() {
        return "<null>".to_string();
    }
    CStr::from_ptr(message).to_string_lossy().into_owned()
}

unsafe fn platform_message(message: *const PdChar) -> String {
    if message.is_null() {
        return "<null>".to_string();
    }
    pdstring::decode(message)
}

/// Names and addresses of every export, referenced from `main` so the
/// linker keeps them in the executable.
pub fn exported_symbols() -> [(&'static str, *const c_void); 8] {
    [
        ("print_simple_message", print_simple_message as extern "C" fn() as *const c_void),
        ("print_int", print_int as extern "C" fn(i32) as *const c_void),
        ("print_float", print_float as extern "C" fn(f32) as *const c_void),
        (
            "print_struct_pointer",
            print_struct_pointer as unsafe extern "C" fn(*const ComplicatedParams) as *const c_void,
        ),
        (
            "print_struct_copy",
            print_struct_copy as extern "C" fn(ComplicatedParams) as *const c_void,
        ),
        (
            "print_struct_reference",
            print_struct_reference as unsafe extern "C" fn(*mut ComplicatedParams) as *const c_void,
        ),
        ("native_log", native_log as unsafe extern "C" fn(*const c_char) as *const c_void),
        (
            "native_log_custom_marshalling",
            native_log_custom_marshalling as unsafe extern "C" fn(*const PdChar) as *const c_void,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use std::ffi::CString;
    use std::ptr;

    use super::{describe_params, exported_symbols, platform_message, utf8_message, ComplicatedParams};
    use crate::pdstring;

    #[test]
    fn params_display_every_field() {
        let params = ComplicatedParams {
            some_option: 11,
            value_of_option: 43.67,
            do_complicated_thingy: false,
        };
        assert_eq!(
            describe_params(Some(&params)),
            "{ some_option: 11, value_of_option: 43.67, do_complicated_thingy: false }"
        );
        assert_eq!(describe_params(None), "<null>");
    }

    #[test]
    fn messages_tolerate_null() {
        unsafe {
            assert_eq!(utf8_message(ptr::null()), "<null>");
            assert_eq!(platform_message(ptr::null()), "<null>");
        }
    }

    #[test]
    fn messages_decode_their_encoding() {
        let utf8 = CString::new("This string is from managed code").unwrap();
        let platform = pdstring::encode("with customized marshalling").unwrap();
        unsafe {
            assert_eq!(utf8_message(utf8.as_ptr()), "This string is from managed code");
            assert_eq!(platform_message(platform.as_ptr()), "with customized marshalling");
        }
    }

    #[test]
    fn every_export_is_listed_once() {
        let symbols = exported_symbols();
        let mut names: Vec<_> = symbols.iter().map(|(name, _)| *name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), 8);
        assert!(symbols.iter().all(|(_, address)| !address.is_null()));
    }
}
