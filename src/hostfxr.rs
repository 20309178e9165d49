use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::ptr;

use log::{debug, error, info};

use crate::context::HostContext;
use crate::error::{HostError, Result};
use crate::exports::{self, HostfxrExports, InitializeOptions};
use crate::library::NativeLibrary;
use crate::locator::HostfxrLocator;
use crate::pdstring::{self, PdChar};
use crate::status::StatusCode;

/// A loaded hostfxr together with its validated exports.
///
/// Created once per process and passed by reference to everything that
/// needs to talk to the runtime.
#[derive(Debug, Clone)]
pub struct Hostfxr {
    path: PathBuf,
    exports: HostfxrExports,
    options: InitializeOptions,
}

impl Hostfxr {
    /// Asks `locator` for the resolver path and loads it.
    ///
    /// Discovery failure returns before any library is opened.
    pub fn locate_and_load<L: HostfxrLocator + ?Sized>(locator: &L, hint: Option<&Path>) -> Result<Hostfxr> {
        let path = locator.locate(hint)?;
        Hostfxr::load_from_path(path)
    }

    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Hostfxr> {
        let library = NativeLibrary::open(path.as_ref())?;
        let exports = HostfxrExports::load(&library)?;
        info!("hostfxr loaded from {}", library.path().display());
        Ok(Hostfxr {
            path: library.path(),
            exports,
            options: InitializeOptions::default(),
        })
    }

    /// Wraps an export table that did not come from [`NativeLibrary`].
    pub fn from_exports<P: Into<PathBuf>>(path: P, exports: HostfxrExports) -> Hostfxr {
        Hostfxr {
            path: path.into(),
            exports,
            options: InitializeOptions::default(),
        }
    }

    /// Parameters forwarded to every `hostfxr_initialize_*` call.
    pub fn with_options(mut self, options: InitializeOptions) -> Hostfxr {
        self.options = options;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exports(&self) -> &HostfxrExports {
        &self.exports
    }

    pub fn options(&self) -> &InitializeOptions {
        &self.options
    }

    /// Runs a managed application as `dotnet app.dll args...` would and
    /// returns its exit code.
    ///
    /// A failed command-line initialization is [`HostError::RunApp`]; once
    /// the app runs, its exit code is returned as is.
    pub fn run_app<S: AsRef<OsStr>>(&self, app_path: &Path, args: &[S]) -> Result<i32> {
        let initialize = self
            .exports
            .initialize_for_dotnet_command_line()
            .ok_or_else(|| HostfxrExports::missing(HostfxrExports::INITIALIZE_FOR_DOTNET_COMMAND_LINE, &self.path))?;
        let run_app = self
            .exports
            .run_app()
            .ok_or_else(|| HostfxrExports::missing(HostfxrExports::RUN_APP, &self.path))?;

        let mut arguments = vec![pdstring::encode(app_path)?];
        for arg in args {
            arguments.push(pdstring::encode(arg)?);
        }
        let argv: Vec<*const PdChar> = arguments.iter().map(|arg| arg.as_ptr()).collect();

        let (host_path, dotnet_root) = self.options.encode()?;
        let parameters = exports::parameters(&host_path, &dotnet_root);
        let parameters_ptr = if self.options.is_empty() { ptr::null() } else { &parameters as *const _ };

        let mut handle = ptr::null_mut();
        let code = StatusCode(unsafe { initialize(argv.len() as i32, argv.as_ptr(), parameters_ptr, &mut handle) });
        let context = match HostContext::adopt(&self.exports, handle) {
            Some(context) if code.is_success() => context,
            _ => {
                error!("Init failed: {}", code);
                return Err(HostError::RunApp {
                    path: app_path.to_path_buf(),
                    code,
                });
            }
        };

        debug!("running {}", app_path.display());
        let exit_code = unsafe { run_app(context.handle()) };
        drop(context);
        Ok(exit_code)
    }
}
