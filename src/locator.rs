//! Finding the hostfxr library on disk.
//!
//! The default [`NethostLocator`] asks nethost, which checks for an app-local
//! copy next to the hint assembly, then the `DOTNET_ROOT` variables, the global
//! install location and the default install directories. A configured
//! `dotnet_root` replaces that search. [`FixedLocator`] skips discovery.

use std::path::{Path, PathBuf};

use log::debug;
use netcorehost::nethost;

use crate::error::{HostError, Result};
use crate::pdstring;

#[cfg(windows)]
pub const HOSTFXR_LIBRARY_NAME: &str = "hostfxr.dll";
#[cfg(target_os = "macos")]
pub const HOSTFXR_LIBRARY_NAME: &str = "libhostfxr.dylib";
#[cfg(not(any(windows, target_os = "macos")))]
pub const HOSTFXR_LIBRARY_NAME: &str = "libhostfxr.so";

/// Resolver discovery: maps an optional hint assembly to a hostfxr path.
pub trait HostfxrLocator {
    fn locate(&self, hint: Option<&Path>) -> Result<PathBuf>;
}

/// Always answers with a fixed path, used when the path is configured.
#[derive(Debug, Clone)]
pub struct FixedLocator(pub PathBuf);

impl HostfxrLocator for FixedLocator {
    fn locate(&self, _hint: Option<&Path>) -> Result<PathBuf> {
        Ok(self.0.clone())
    }
}

#[derive(Debug, Clone, Default)]
pub struct NethostLocator {
    dotnet_root: Option<PathBuf>,
}

impl NethostLocator {
    /// Only look under `root`; the hint assembly is ignored.
    pub fn with_dotnet_root<P: Into<PathBuf>>(mut self, root: P) -> NethostLocator {
        self.dotnet_root = Some(root.into());
        self
    }

    pub fn dotnet_root(&self) -> Option<&Path> {
        self.dotnet_root.as_deref()
    }
}

impl HostfxrLocator for NethostLocator {
    fn locate(&self, hint: Option<&Path>) -> Result<PathBuf> {
        let (located, searched) = match (&self.dotnet_root, hint) {
            (Some(root), _) => (
                nethost::get_hostfxr_path_with_dotnet_root(pdstring::encode(root)?),
                format!("dotnet root {}", root.display()),
            ),
            (None, Some(assembly)) => (
                nethost::get_hostfxr_path_with_assembly_path(pdstring::encode(assembly)?),
                format!("app-local and global locations for {}", assembly.display()),
            ),
            (None, None) => (nethost::get_hostfxr_path(), "global locations".to_string()),
        };
        match located {
            Ok(path) => {
                let path = PathBuf::from(path.to_string_lossy().to_string());
                debug!("found hostfxr {}", path.display());
                Ok(path)
            }
            Err(err) => Err(HostError::Discovery(format!("searched {}: {}", searched, err))),
        }
    }
}
