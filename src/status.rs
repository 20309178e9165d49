//! Numeric status codes returned by hostfxr and the runtime.

use std::fmt;

/// A raw `int32_t` status from a hosting call. Zero is success.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusCode(pub i32);

impl StatusCode {
    pub const SUCCESS: StatusCode = StatusCode(0);

    pub fn is_success(self) -> bool {
        self.0 == 0
    }

    pub fn as_hex(self) -> u32 {
        self.0 as u32
    }

    /// Symbolic name for codes documented by the hosting layer and the CLR.
    pub fn name(self) -> Option<&'static str> {
        let name = match self.as_hex() {
            0x0000_0000 => "Success",
            0x0000_0001 => "Success_HostAlreadyInitialized",
            0x0000_0002 => "Success_DifferentRuntimeProperties",
            0x8000_8081 => "InvalidArgFailure",
            0x8000_8082 => "CoreHostLibLoadFailure",
            0x8000_8083 => "CoreHostLibMissingFailure",
            0x8000_8084 => "CoreHostEntryPointFailure",
            0x8000_8085 => "CoreHostCurHostFindFailure",
            0x8000_8087 => "CoreClrResolveFailure",
            0x8000_8088 => "CoreClrBindFailure",
            0x8000_8089 => "CoreClrInitFailure",
            0x8000_808a => "CoreClrExeFailure",
            0x8000_808b => "ResolverInitFailure",
            0x8000_808c => "ResolverResolveFailure",
            0x8000_808d => "LibHostCurExeFindFailure",
            0x8000_808e => "LibHostInitFailure",
            0x8000_8091 => "LibHostSdkFindFailure",
            0x8000_8092 => "LibHostInvalidArgs",
            0x8000_8093 => "InvalidConfigFile",
            0x8000_8094 => "AppArgNotRunnable",
            0x8000_8095 => "AppHostExeNotBoundFailure",
            0x8000_8096 => "FrameworkMissingFailure",
            0x8000_8097 => "HostApiFailed",
            0x8000_8098 => "HostApiBufferTooSmall",
            0x8000_8099 => "LibHostUnknownCommand",
            0x8000_809a => "LibHostAppRootFindFailure",
            0x8000_809b => "SdkResolverResolveFailure",
            0x8000_809c => "FrameworkCompatFailure",
            0x8000_809d => "FrameworkCompatRetry",
            0x8000_809f => "BundleExtractionFailure",
            0x8000_80a0 => "BundleExtractionIOError",
            0x8000_80a1 => "LibHostDuplicateProperty",
            0x8000_80a2 => "HostApiUnsupportedVersion",
            0x8000_80a3 => "HostInvalidState",
            0x8000_80a4 => "HostPropertyNotFound",
            0x8000_80a5 => "CoreHostIncompatibleConfig",
            0x8000_80a6 => "HostApiUnsupportedScenario",
            0x8000_80a7 => "HostFeatureDisabled",
            0x8007_0002 => "FileNotFound",
            0x8013_1513 => "MissingMethod",
            0x8013_1522 => "TypeLoad",
            _ => return None,
        };
        Some(name)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.as_hex())?;
        if let Some(name) = self.name() {
            write!(f, " ({})", name)?;
        }
        Ok(())
    }
}

impl fmt::Debug for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl From<i32> for StatusCode {
    fn from(code: i32) -> StatusCode {
        StatusCode(code)
    }
}
