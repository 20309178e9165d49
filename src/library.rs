extern crate libloading as lib;

use std::fmt;
use std::path::{Path, PathBuf};

use log::{debug, trace};

use crate::error::{HostError, Result};

/// A dynamically loaded library that stays resident until the process exits.
///
/// There is deliberately no way to unload: the hosted runtime keeps calling
/// into hostfxr for as long as it lives.
#[derive(Clone, Copy)]
pub struct NativeLibrary {
    library: &'static lib::Library,
    path: &'static Path,
}

impl NativeLibrary {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<NativeLibrary> {
        let path = path.as_ref();
        debug!("loading native library {}", path.display());
        let library = unsafe { lib::Library::new(path) }.map_err(|source| HostError::Load {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(NativeLibrary {
            library: Box::leak(Box::new(library)),
            path: Box::leak(path.to_path_buf().into_boxed_path()),
        })
    }

    /// Looks up `name` and copies it out as `T`.
    ///
    /// # Safety
    /// `T` must be the exact pointer type of the exported symbol.
    pub unsafe fn lookup<T: Copy>(&self, name: &'static str) -> Result<T> {
        let symbol: lib::Symbol<T> = self.library.get(name.as_bytes()).map_err(|_| HostError::MissingExport {
            name,
            path: self.path.to_path_buf(),
        })?;
        trace!("resolved {} from {}", name, self.path.display());
        Ok(*symbol)
    }

    /// Like [`lookup`](Self::lookup), but absence is not an error.
    ///
    /// # Safety
    /// Same contract as [`lookup`](Self::lookup).
    pub unsafe fn lookup_optional<T: Copy>(&self, name: &'static str) -> Option<T> {
        match self.lookup(name) {
            Ok(symbol) => Some(symbol),
            Err(error) => {
                debug!("{}", error);
                None
            }
        }
    }

    pub fn path(&self) -> PathBuf {
        self.path.to_path_buf()
    }
}

impl fmt::Debug for NativeLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeLibrary").field("path", &self.path).finish()
    }
}
