//! Native libraries owned by an isolation context.
//!
//! Libraries stored under an archive's `lib/` directory are extracted into
//! a private scratch directory before loading; libraries found directly in
//! a bundle's dependency directory are loaded in place.

use std::fmt;
use std::fs::File;
use std::io::{Read, Seek};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use bundlekit_sdk::{
    RegisterFn, Registrar, ABI_VERSION_SYMBOL, BUNDLE_ABI_VERSION, REGISTER_SYMBOL,
};
use libloading::{Library, Symbol};
use tempfile::TempDir;
use tracing::debug;
use zip::ZipArchive;

use crate::error::{PluginError, Result};

/// Archive directory holding native libraries.
pub const ARCHIVE_LIBRARY_DIR: &str = "lib";

/// Check if a path names a shared library for the current platform.
pub fn is_native_library(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.len() > std::env::consts::DLL_SUFFIX.len())
        .unwrap_or(false)
        && path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e == std::env::consts::DLL_EXTENSION)
            .unwrap_or(false)
}

/// List the shared libraries directly inside a directory, sorted by path.
pub fn list_libraries(dir: &Path) -> Result<Vec<PathBuf>> {
    let unreadable = |e: std::io::Error| PluginError::isolation(dir, e);

    let mut libraries = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(unreadable)? {
        let path = entry.map_err(unreadable)?.path();
        if path.is_file() && is_native_library(&path) {
            libraries.push(path);
        }
    }
    libraries.sort();

    Ok(libraries)
}

struct LoadedLibrary {
    path: PathBuf,
    library: Library,
}

/// The native libraries of one isolation context and the scratch directory
/// they were extracted to.
///
/// Instances created from a library hold the set through an `Arc`, so the
/// libraries stay mapped until the context is released and the last such
/// instance is gone.
pub struct LibrarySet {
    // Libraries must be unloaded before their files are removed
    libraries: Vec<LoadedLibrary>,
    scratch: Option<TempDir>,
}

impl LibrarySet {
    pub(crate) fn new() -> Self {
        Self {
            libraries: Vec::new(),
            scratch: None,
        }
    }

    /// Paths of the loaded libraries, in load order.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.libraries.iter().map(|l| l.path.as_path())
    }

    /// Scratch directory native libraries were extracted to, if any.
    pub fn scratch_dir(&self) -> Option<&Path> {
        self.scratch.as_ref().map(TempDir::path)
    }

    pub fn len(&self) -> usize {
        self.libraries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.libraries.is_empty()
    }

    /// Extract the libraries under `lib/` of an archive into the scratch
    /// directory and return their paths.
    pub(crate) fn extract<R: Read + Seek>(
        &mut self,
        location: &Path,
        archive: &mut ZipArchive<R>,
    ) -> Result<Vec<PathBuf>> {
        let mut extracted = Vec::new();

        for i in 0..archive.len() {
            let mut entry = archive
                .by_index(i)
                .map_err(|e| PluginError::isolation(location, e))?;
            if entry.is_dir() {
                continue;
            }

            let Some(name) = entry.enclosed_name() else {
                debug!(
                    archive = %location.display(),
                    entry = entry.name(),
                    "Skipping unsafe entry name"
                );
                continue;
            };
            let in_library_dir = name.parent() == Some(Path::new(ARCHIVE_LIBRARY_DIR));
            if !in_library_dir || !is_native_library(&name) {
                continue;
            }
            let Some(file_name) = name.file_name() else {
                continue;
            };

            let target = self.scratch(location)?.join(file_name);
            let mut out =
                File::create(&target).map_err(|e| PluginError::isolation(location, e))?;
            std::io::copy(&mut entry, &mut out).map_err(|e| {
                let reason = format!("Failed to extract {}: {e}", name.display());
                PluginError::isolation(location, reason)
            })?;

            debug!(
                archive = %location.display(),
                library = %target.display(),
                "Extracted native library"
            );
            extracted.push(target);
        }

        Ok(extracted)
    }

    /// Load a library. Returns the constructors it registers, or `None` for
    /// a plain dependency without a registration function.
    pub(crate) fn load(&mut self, path: &Path) -> Result<Option<Registrar>> {
        // Loading runs the library's initialisers; bundle code is trusted.
        let library = unsafe {
            Library::new(path)
                .map_err(|e| PluginError::isolation(path, format!("Failed to load library: {e}")))?
        };

        let registrar = register(&library, path)?;
        debug!(
            library = %path.display(),
            constructors = registrar.as_ref().map(Registrar::len).unwrap_or(0),
            "Loaded native library"
        );

        self.libraries.push(LoadedLibrary {
            path: path.to_path_buf(),
            library,
        });
        Ok(registrar)
    }

    /// Unload every library in reverse load order, then remove the scratch
    /// directory. Failures are logged and otherwise ignored.
    pub(crate) fn close(self) {
        let Self {
            mut libraries,
            scratch,
        } = self;

        while let Some(LoadedLibrary { path, library }) = libraries.pop() {
            if let Err(e) = library.close() {
                debug!(library = %path.display(), error = %e, "Failed to unload library");
            }
        }

        if let Some(scratch) = scratch {
            let dir = scratch.path().to_path_buf();
            if let Err(e) = scratch.close() {
                debug!(dir = %dir.display(), error = %e, "Failed to remove scratch directory");
            }
        }
    }

    fn scratch(&mut self, location: &Path) -> Result<&Path> {
        if self.scratch.is_none() {
            let dir = tempfile::Builder::new()
                .prefix("bundlekit-")
                .tempdir()
                .map_err(|e| {
                    let reason = format!("Failed to create scratch directory: {e}");
                    PluginError::isolation(location, reason)
                })?;
            self.scratch = Some(dir);
        }

        match &self.scratch {
            Some(dir) => Ok(dir.path()),
            None => Err(PluginError::isolation(location, "Scratch directory unavailable")),
        }
    }
}

impl fmt::Debug for LibrarySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LibrarySet")
            .field("libraries", &self.paths().collect::<Vec<_>>())
            .field("scratch", &self.scratch_dir())
            .finish()
    }
}

/// Run the registration function of a library, after checking it was built
/// against the same ABI version as the host.
fn register(library: &Library, path: &Path) -> Result<Option<Registrar>> {
    let register_fn: RegisterFn = match unsafe { library.get::<RegisterFn>(REGISTER_SYMBOL) } {
        Ok(symbol) => *symbol,
        Err(_) => return Ok(None),
    };

    let version = unsafe {
        let symbol: Symbol<*const u32> = library
            .get(ABI_VERSION_SYMBOL)
            .map_err(|_| PluginError::isolation(path, "Library exports no ABI version"))?;
        **symbol
    };
    if version != BUNDLE_ABI_VERSION {
        return Err(PluginError::isolation(
            path,
            format!("ABI version mismatch: host {BUNDLE_ABI_VERSION}, library {version}"),
        ));
    }

    let mut registrar = Registrar::new();
    panic::catch_unwind(AssertUnwindSafe(|| unsafe { register_fn(&mut registrar) }))
        .map_err(|_| PluginError::isolation(path, "Registration function panicked"))?;

    Ok(Some(registrar))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn library_name(stem: &str) -> String {
        format!(
            "{}{stem}{}",
            std::env::consts::DLL_PREFIX,
            std::env::consts::DLL_SUFFIX
        )
    }

    #[test]
    fn test_is_native_library() {
        assert!(is_native_library(Path::new(&library_name("demo"))));
        assert!(!is_native_library(Path::new("demo.txt")));
        assert!(!is_native_library(Path::new("demo")));
    }

    #[test]
    fn test_list_libraries() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(library_name("b")), b"").unwrap();
        std::fs::write(dir.path().join(library_name("a")), b"").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"").unwrap();

        let libraries = list_libraries(dir.path()).unwrap();
        assert_eq!(
            libraries,
            vec![dir.path().join(library_name("a")), dir.path().join(library_name("b"))]
        );
    }

    #[test]
    fn test_extract_only_library_dir() {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for name in [
            format!("lib/{}", library_name("inner")),
            format!("lib/nested/{}", library_name("deep")),
            format!("other/{}", library_name("outside")),
            "lib/readme.txt".to_string(),
        ] {
            writer.start_file(name, SimpleFileOptions::default()).unwrap();
            writer.write_all(b"binary").unwrap();
        }
        let mut archive = ZipArchive::new(writer.finish().unwrap()).unwrap();

        let mut set = LibrarySet::new();
        let extracted = set
            .extract(Path::new("/bundles/demo.plugin"), &mut archive)
            .unwrap();

        assert_eq!(extracted.len(), 1);
        assert!(extracted[0].ends_with(library_name("inner")));
        assert_eq!(std::fs::read(&extracted[0]).unwrap(), b"binary");

        let scratch = set.scratch_dir().unwrap().to_path_buf();
        set.close();
        assert!(!scratch.exists());
    }

    #[test]
    fn test_load_invalid_library() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(library_name("broken"));
        std::fs::write(&path, b"not a shared object").unwrap();

        let mut set = LibrarySet::new();
        let err = set.load(&path).unwrap_err();
        assert!(matches!(err, PluginError::Isolation { .. }));
        assert!(set.is_empty());
    }
}
