//! Platform-dependent C strings (`char_t` in the hosting headers).
//!
//! The string types come from `netcorehost::pdcstring`: UTF-16 on Windows,
//! narrow UTF-8 everywhere else. This module only maps their errors into
//! [`HostError`] and decodes strings that arrive from foreign memory.

use std::ffi::OsStr;

pub use netcorehost::pdcstring::{PdCStr, PdCString, PdChar};

use crate::error::{HostError, Result};

/// Encodes `value`, rejecting interior nul characters.
pub fn encode<S: AsRef<OsStr> + ?Sized>(value: &S) -> Result<PdCString> {
    let value = value.as_ref();
    PdCString::from_os_str(value).map_err(|_| HostError::InteriorNul(value.to_string_lossy().into_owned()))
}

/// Copies a nul-terminated platform string out of foreign memory.
///
/// # Safety
/// `ptr` must be non-null and point to a nul-terminated sequence of
/// `PdChar` that stays valid for the duration of the call.
pub unsafe fn decode(ptr: *const PdChar) -> String {
    PdCStr::from_str_ptr(ptr).to_string_lossy().into()
}
