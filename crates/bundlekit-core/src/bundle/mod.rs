//! Bundle discovery.
//!
//! A bundle is one archive in a plugin root directory, optionally
//! accompanied by a sibling directory (archive name without its extension)
//! holding extra dependency libraries:
//!
//! ```text
//! plugins/
//! ├── ExecutablePlugin.plugin      zip: bundle.toml + lib/*.so
//! └── ExecutablePlugin/            optional dependencies
//!     └── libdependency.so
//! ```

pub mod manifest;
pub mod scanner;

use std::path::{Path, PathBuf};

pub use manifest::{BundleManifest, ManifestError};
pub use scanner::BundleScanner;

/// Everything needed to load one plugin bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleDescriptor {
    entry_point: String,
    resource_locations: Vec<PathBuf>,
}

impl BundleDescriptor {
    /// Create a descriptor from an entry point and its resource locations.
    pub fn new<I, P>(entry_point: impl Into<String>, resource_locations: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            entry_point: entry_point.into(),
            resource_locations: resource_locations.into_iter().map(Into::into).collect(),
        }
    }

    /// Create the descriptor of an archive: the archive itself followed by
    /// its sibling dependency directory (which need not exist).
    pub fn for_archive(entry_point: impl Into<String>, archive: &Path, suffix: &str) -> Self {
        let libraries = dependency_dir(archive, suffix);
        Self::new(entry_point, [archive.to_path_buf(), libraries])
    }

    /// Fully qualified identifier of the constructible entry point.
    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    /// Locations searched for the bundle's code, in lookup order.
    pub fn resource_locations(&self) -> &[PathBuf] {
        &self.resource_locations
    }

    /// Lookup name of the plugin, see [`plugin_name`].
    pub fn plugin_name(&self) -> &str {
        plugin_name(&self.entry_point)
    }
}

/// Derive a plugin name from an entry-point identifier by dropping its
/// namespace qualifier.
///
/// Both `.` and `::` separate qualifier segments. A separator in the first
/// position does not count, so `.Hidden` stays `.Hidden`.
pub fn plugin_name(entry_point: &str) -> &str {
    let dot = entry_point.rfind('.').map(|i| (i, i + 1));
    let path = entry_point.rfind("::").map(|i| (i, i + 2));

    match dot.into_iter().chain(path).max_by_key(|&(start, _)| start) {
        Some((start, end)) if start > 0 => &entry_point[end..],
        _ => entry_point,
    }
}

fn dependency_dir(archive: &Path, suffix: &str) -> PathBuf {
    let file_name = archive
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    let stem = file_name.strip_suffix(suffix).unwrap_or(file_name);
    archive.with_file_name(stem)
}
