//! Per-bundle isolation context.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use bundlekit_sdk::Registrar;
use parking_lot::{Mutex, RwLock};
use tracing::debug;
use zip::result::ZipError;
use zip::ZipArchive;

use super::native::{list_libraries, LibrarySet};
use super::{Namespace, Resolution, ResolutionOrigin, Resolved};
use crate::error::{PluginError, Result};

/// A private namespace rooted at a bundle's resource locations and chained
/// to a parent namespace.
///
/// The context owns the bundle's open archive handles, its loaded native
/// libraries and their scratch directory. These are given back by
/// [`release`](Self::release), which runs at most once; dropping an
/// unreleased context releases it.
pub struct IsolationContext {
    label: String,
    locations: Vec<PathBuf>,
    parent: Arc<dyn Namespace>,
    state: RwLock<Option<OwnResources>>,
}

impl IsolationContext {
    /// Open a context over the given resource locations.
    ///
    /// Locations are either bundle archives or dependency directories.
    /// Locations that do not exist are ignored. A location that exists but
    /// cannot be opened, or a library that cannot be loaded, fails the
    /// whole context; anything opened so far is given back first.
    pub fn open<I, P>(
        label: impl Into<String>,
        locations: I,
        parent: Arc<dyn Namespace>,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let label = label.into();
        let locations: Vec<PathBuf> = locations.into_iter().map(Into::into).collect();
        let resources = OwnResources::open(&locations)?;

        debug!(
            context = %label,
            locations = locations.len(),
            libraries = resources.libraries.len(),
            "Opened isolation context"
        );

        Ok(Self {
            label,
            locations,
            parent,
            state: RwLock::new(Some(resources)),
        })
    }

    /// Create a context whose own namespace is a registrar filled in-process,
    /// for bundles linked into the host binary. It holds no native resources.
    pub fn from_registrar(
        label: impl Into<String>,
        registrar: Registrar,
        parent: Arc<dyn Namespace>,
    ) -> Self {
        let resources = OwnResources {
            sources: vec![CodeSource {
                origin: PathBuf::new(),
                registrar,
            }],
            archives: Vec::new(),
            directories: Vec::new(),
            libraries: Arc::new(LibrarySet::new()),
        };

        Self {
            label: label.into(),
            locations: Vec::new(),
            parent,
            state: RwLock::new(Some(resources)),
        }
    }

    /// Label used in log records, usually the bundle entry point.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Resource locations the context was opened over.
    pub fn locations(&self) -> &[PathBuf] {
        &self.locations
    }

    /// Native libraries loaded into the context, in load order. Empty once
    /// released.
    pub fn library_paths(&self) -> Vec<PathBuf> {
        self.state
            .read()
            .as_ref()
            .map(|own| own.libraries.paths().map(Path::to_path_buf).collect())
            .unwrap_or_default()
    }

    /// Directory archive libraries were extracted to, if any.
    pub fn scratch_dir(&self) -> Option<PathBuf> {
        self.state
            .read()
            .as_ref()
            .and_then(|own| own.libraries.scratch_dir().map(Path::to_path_buf))
    }

    /// Check if the context has been released.
    pub fn is_released(&self) -> bool {
        self.state.read().is_none()
    }

    /// Resolve an identifier: the bundle's own libraries first, then the
    /// parent namespace. `Ok(None)` if neither knows it.
    pub fn lookup(&self, identifier: &str) -> Result<Option<Resolution>> {
        {
            let state = self.state.read();
            let Some(own) = state.as_ref() else {
                return Err(PluginError::Closed);
            };

            if let Some(resolved) = own.resolve(identifier) {
                return Ok(Some(Resolution {
                    origin: ResolutionOrigin::Own,
                    resolved,
                }));
            }
        }

        Ok(self.parent.resolve(identifier).map(|resolved| Resolution {
            origin: ResolutionOrigin::Parent,
            resolved,
        }))
    }

    /// Read a named resource of the bundle: archive entries first, then
    /// files in dependency directories. The parent namespace holds no
    /// resources.
    pub fn read_resource(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let relative = Path::new(name);
        let is_relative = !name.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !is_relative {
            return Err(PluginError::invalid_argument(format!(
                "Resource name must be a relative path, got {name:?}"
            )));
        }

        let state = self.state.read();
        let Some(own) = state.as_ref() else {
            return Err(PluginError::Closed);
        };
        own.read_resource(name, relative)
    }

    /// Give back every resource the context owns.
    ///
    /// Returns `false` if the context was already released. Failures are
    /// logged at debug level and otherwise ignored. Libraries still pinned
    /// by live plugin instances are unloaded once the last instance is
    /// dropped.
    pub fn release(&self) -> bool {
        let Some(own) = self.state.write().take() else {
            return false;
        };

        own.release(&self.label);
        debug!(context = %self.label, "Released isolation context");
        true
    }
}

impl Namespace for IsolationContext {
    fn resolve(&self, identifier: &str) -> Option<Resolved> {
        self.lookup(identifier)
            .ok()
            .flatten()
            .map(|resolution| resolution.resolved)
    }
}

impl Drop for IsolationContext {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for IsolationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IsolationContext")
            .field("label", &self.label)
            .field("locations", &self.locations)
            .field("released", &self.is_released())
            .finish()
    }
}

/// Constructors registered by one library.
struct CodeSource {
    origin: PathBuf,
    registrar: Registrar,
}

struct OpenArchive {
    path: PathBuf,
    archive: Mutex<ZipArchive<File>>,
}

/// Everything a context gives back on release.
struct OwnResources {
    // Constructors point into the libraries and must be dropped first
    sources: Vec<CodeSource>,
    archives: Vec<OpenArchive>,
    directories: Vec<PathBuf>,
    libraries: Arc<LibrarySet>,
}

impl OwnResources {
    fn open(locations: &[PathBuf]) -> Result<Self> {
        let mut libraries = LibrarySet::new();
        let mut archives = Vec::new();
        let mut directories = Vec::new();
        let mut dependencies = Vec::new();
        let mut extracted = Vec::new();

        for (index, location) in locations.iter().enumerate() {
            if location.as_os_str().is_empty() {
                return Err(PluginError::isolation(location, "Empty resource location"));
            }

            if location.is_dir() {
                for library in list_libraries(location)? {
                    dependencies.push((index, library));
                }
                directories.push(location.clone());
            } else if location.is_file() {
                let file =
                    File::open(location).map_err(|e| PluginError::isolation(location, e))?;
                let mut archive =
                    ZipArchive::new(file).map_err(|e| PluginError::isolation(location, e))?;
                for library in libraries.extract(location, &mut archive)? {
                    extracted.push((index, library));
                }
                archives.push(OpenArchive {
                    path: location.clone(),
                    archive: Mutex::new(archive),
                });
            } else {
                debug!(location = %location.display(), "Skipping missing resource location");
            }
        }

        // Dependency directories are loaded first so bundle libraries linking
        // against them find them already mapped. Lookup follows location
        // order regardless.
        let mut sources = Vec::new();
        for (index, path) in dependencies.into_iter().chain(extracted) {
            if let Some(registrar) = libraries.load(&path)? {
                sources.push((index, CodeSource { origin: path, registrar }));
            }
        }
        sources.sort_by_key(|(index, _)| *index);

        Ok(Self {
            sources: sources.into_iter().map(|(_, source)| source).collect(),
            archives,
            directories,
            libraries: Arc::new(libraries),
        })
    }

    fn resolve(&self, identifier: &str) -> Option<Resolved> {
        self.sources.iter().find_map(|source| {
            source.registrar.get(identifier).map(|constructor| {
                debug!(
                    identifier,
                    library = %source.origin.display(),
                    "Resolved in bundle"
                );
                Resolved::pinned(constructor, self.libraries.clone())
            })
        })
    }

    fn read_resource(&self, name: &str, relative: &Path) -> Result<Option<Vec<u8>>> {
        for open in &self.archives {
            let mut archive = open.archive.lock();
            let mut entry = match archive.by_name(name) {
                Ok(entry) => entry,
                Err(ZipError::FileNotFound) => continue,
                Err(e) => return Err(PluginError::isolation(&open.path, e)),
            };
            if entry.is_dir() {
                continue;
            }

            let mut content = Vec::new();
            entry
                .read_to_end(&mut content)
                .map_err(|e| PluginError::isolation(&open.path, e))?;
            return Ok(Some(content));
        }

        for dir in &self.directories {
            let candidate = dir.join(relative);
            if candidate.is_file() {
                let content = std::fs::read(&candidate)
                    .map_err(|e| PluginError::isolation(&candidate, e))?;
                return Ok(Some(content));
            }
        }

        Ok(None)
    }

    fn release(self, label: &str) {
        let Self {
            sources,
            archives,
            directories: _,
            libraries,
        } = self;

        drop(sources);
        drop(archives);

        match Arc::try_unwrap(libraries) {
            Ok(libraries) => libraries.close(),
            Err(pinned) => debug!(
                context = label,
                instances = Arc::strong_count(&pinned) - 1,
                "Native libraries still in use, unloading deferred"
            ),
        }
    }
}
