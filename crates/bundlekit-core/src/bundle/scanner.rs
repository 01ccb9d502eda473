//! Plugin root directory scanner.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::{BundleDescriptor, BundleManifest};
use crate::config::LoaderConfig;
use crate::error::{PluginError, Result};

/// Scans plugin root directories for bundle archives.
///
/// Roots are not searched recursively. Files that are not valid bundles are
/// skipped silently: plugin directories routinely contain other archives.
/// Failing to list a root directory is an installation problem and is
/// reported instead.
#[derive(Debug, Clone)]
pub struct BundleScanner {
    roots: Vec<PathBuf>,
    archive_suffix: String,
    manifest_entry: String,
}

impl BundleScanner {
    /// Create a scanner over the given roots with default settings.
    pub fn new<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self::from_config(&LoaderConfig::new(roots))
    }

    /// Create a scanner from a loader configuration.
    pub fn from_config(config: &LoaderConfig) -> Self {
        Self {
            roots: config.roots.clone(),
            archive_suffix: config.archive_suffix(),
            manifest_entry: config.manifest_entry.clone(),
        }
    }

    /// Get the root directories, in scan order.
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Scan every root and return the descriptors of all valid bundles.
    ///
    /// Descriptors of a later root come after those of an earlier root.
    /// Within one root the order follows the directory listing and is
    /// unspecified.
    pub fn scan(&self) -> Result<Vec<BundleDescriptor>> {
        let mut descriptors = Vec::new();

        for root in &self.roots {
            for path in list_children(root)? {
                if !self.is_bundle_archive(&path) {
                    continue;
                }

                if let Some(descriptor) = self.read_descriptor(&path) {
                    debug!(
                        archive = %path.display(),
                        entry_point = %descriptor.entry_point(),
                        "Discovered bundle"
                    );
                    descriptors.push(descriptor);
                }
            }
        }

        info!(
            roots = self.roots.len(),
            bundles = descriptors.len(),
            "Bundle scan complete"
        );

        Ok(descriptors)
    }

    /// Check if a path names a bundle archive, based on its file name only.
    ///
    /// The name needs a non-empty stem: the stem names the sibling
    /// dependency directory, and an empty one would be the root itself.
    pub fn is_bundle_archive(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_suffix(self.archive_suffix.as_str()))
            .map(|stem| !stem.is_empty())
            .unwrap_or(false)
    }

    /// Read the descriptor of one archive, `None` if it is not a bundle.
    pub fn read_descriptor(&self, archive: &Path) -> Option<BundleDescriptor> {
        let manifest = match BundleManifest::read(archive, &self.manifest_entry) {
            Ok(manifest) => manifest,
            Err(e) => {
                debug!(archive = %archive.display(), error = %e, "Skipping archive");
                return None;
            }
        };

        let Some(entry_point) = manifest.entry_point() else {
            debug!(archive = %archive.display(), "Skipping archive without entry-point");
            return None;
        };

        Some(BundleDescriptor::for_archive(
            entry_point,
            archive,
            &self.archive_suffix,
        ))
    }
}

/// List the immediate children of a root. Anything that is not a
/// directory has no children.
fn list_children(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        debug!(root = %root.display(), "Plugin root is not a directory");
        return Ok(Vec::new());
    }

    let discovery_failed = |source| PluginError::DiscoveryFailed {
        path: root.to_path_buf(),
        source,
    };

    let mut children = Vec::new();
    for entry in std::fs::read_dir(root).map_err(discovery_failed)? {
        children.push(entry.map_err(discovery_failed)?.path());
    }

    Ok(children)
}
