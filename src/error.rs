use std::path::PathBuf;

use thiserror::Error;

use crate::status::StatusCode;

pub type Result<T> = std::result::Result<T, HostError>;

/// Everything that can go wrong between finding hostfxr and calling into
/// managed code.
#[derive(Debug, Error)]
pub enum HostError {
    /// No hostfxr library could be found for this platform or installation.
    #[error("unable to locate hostfxr: {0}")]
    Discovery(String),

    /// The library exists but could not be opened.
    #[error("failed to load `{}`: {source}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },

    /// A required export is absent from the loaded library.
    #[error("export `{name}` is missing from `{}`", path.display())]
    MissingExport { name: &'static str, path: PathBuf },

    /// `hostfxr_initialize_*` returned non-zero or no context.
    #[error("runtime initialization failed for `{}`: {code}", path.display())]
    Initialization { path: PathBuf, code: StatusCode },

    /// `hostfxr_get_runtime_delegate` returned non-zero or a null delegate.
    #[error("unable to acquire runtime delegate: {0}")]
    DelegateAcquisition(StatusCode),

    /// A managed member could not be resolved under the requested signature.
    #[error("unable to resolve `{type_name}::{method}`: {code}")]
    Resolution {
        type_name: String,
        method: String,
        code: StatusCode,
    },

    /// A call shape was paired with a signature it cannot be invoked under.
    #[error("`{method}` cannot be invoked as {shape}")]
    InvalidSignature { method: String, shape: &'static str },

    /// `hostfxr_initialize_for_dotnet_command_line` returned non-zero or no
    /// context for the app.
    #[error("running `{}` failed: {code}", path.display())]
    RunApp { path: PathBuf, code: StatusCode },

    #[error("string contains an interior nul: {0:?}")]
    InteriorNul(String),

    #[error("configuration: {0}")]
    Config(String),

    #[error("logging: {0}")]
    Logging(String),
}

impl HostError {
    /// The hosting status code behind this error, when there is one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            HostError::Initialization { code, .. }
            | HostError::Resolution { code, .. }
            | HostError::RunApp { code, .. } => Some(*code),
            HostError::DelegateAcquisition(code) => Some(*code),
            _ => None,
        }
    }
}

impl From<flexi_logger::FlexiLoggerError> for HostError {
    fn from(error: flexi_logger::FlexiLoggerError) -> HostError {
        HostError::Logging(error.to_string())
    }
}
