//! Loader configuration.
//!
//! Configuration can come from a TOML file, from the environment, or be
//! built in code:
//!
//! ```toml
//! roots = ["/opt/app/plugins", "/home/app/.plugins"]
//! archive_extension = "plugin"
//! manifest_entry = "bundle.toml"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PluginError, Result};

/// Default values
pub mod defaults {
    /// File extension of bundle archives (without the dot)
    pub const ARCHIVE_EXTENSION: &str = "plugin";
    /// Name of the manifest entry inside a bundle archive
    pub const MANIFEST_ENTRY: &str = "bundle.toml";
}

/// Environment variable names
pub mod env_vars {
    /// Plugin root directories, in the platform's path list syntax
    pub const PLUGIN_PATH: &str = "BUNDLEKIT_PLUGIN_PATH";
}

/// Where bundles are discovered and how they are recognised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Root directories, scanned in order. Later roots take priority on
    /// plugin name collisions.
    pub roots: Vec<PathBuf>,

    /// Extension identifying bundle archives.
    pub archive_extension: String,

    /// Manifest entry declaring the bundle entry point.
    pub manifest_entry: String,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            archive_extension: defaults::ARCHIVE_EXTENSION.to_string(),
            manifest_entry: defaults::MANIFEST_ENTRY.to_string(),
        }
    }
}

impl LoaderConfig {
    /// Create a configuration scanning the given roots with default settings.
    pub fn new<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            roots: roots.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Load the configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            PluginError::config(format!("Cannot read {}: {}", path.display(), e))
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| {
            PluginError::config(format!("Cannot parse {}: {}", path.display(), e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Build a configuration whose roots come from [`env_vars::PLUGIN_PATH`].
    ///
    /// An unset variable yields no roots.
    pub fn from_env() -> Self {
        let roots = std::env::var_os(env_vars::PLUGIN_PATH)
            .map(|paths| std::env::split_paths(&paths).collect())
            .unwrap_or_default();

        Self {
            roots,
            ..Self::default()
        }
    }

    /// Append a root directory.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.roots.push(root.into());
        self
    }

    /// Set the archive extension. A leading dot is ignored.
    pub fn with_archive_extension(mut self, extension: impl Into<String>) -> Self {
        self.archive_extension = extension.into();
        self
    }

    /// Set the manifest entry name.
    pub fn with_manifest_entry(mut self, entry: impl Into<String>) -> Self {
        self.manifest_entry = entry.into();
        self
    }

    /// Check the configuration for values the scanner cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.archive_extension.trim_start_matches('.').trim().is_empty() {
            return Err(PluginError::config("archive_extension must not be empty"));
        }

        if self.manifest_entry.trim().is_empty() {
            return Err(PluginError::config("manifest_entry must not be empty"));
        }

        Ok(())
    }

    /// File name suffix of bundle archives, dot included.
    pub fn archive_suffix(&self) -> String {
        format!(".{}", self.archive_extension.trim_start_matches('.'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LoaderConfig::default();
        assert!(config.roots.is_empty());
        assert_eq!(config.archive_suffix(), ".plugin");
        assert_eq!(config.manifest_entry, "bundle.toml");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = LoaderConfig::new(["/a"])
            .with_root("/b")
            .with_archive_extension(".jar")
            .with_manifest_entry("META-INF/bundle.toml");

        assert_eq!(config.roots, vec![PathBuf::from("/a"), PathBuf::from("/b")]);
        assert_eq!(config.archive_suffix(), ".jar");
        assert_eq!(config.manifest_entry, "META-INF/bundle.toml");
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loader.toml");
        std::fs::write(
            &path,
            r#"
roots = ["/opt/plugins", "/srv/plugins"]
archive_extension = "kpa"
"#,
        )
        .unwrap();

        let config = LoaderConfig::from_file(&path).unwrap();
        assert_eq!(config.roots.len(), 2);
        assert_eq!(config.archive_extension, "kpa");
        assert_eq!(config.manifest_entry, defaults::MANIFEST_ENTRY);
    }

    #[test]
    fn test_from_file_rejects_empty_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loader.toml");
        std::fs::write(&path, "archive_extension = \".\"\n").unwrap();

        let err = LoaderConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, PluginError::Config(_)));
    }

    #[test]
    fn test_from_file_missing() {
        let err = LoaderConfig::from_file("/nonexistent/loader.toml").unwrap_err();
        assert!(err.to_string().starts_with("Configuration error: Cannot read"));
    }

    #[test]
    fn test_from_file_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loader.toml");
        std::fs::write(&path, "roots = 12\n").unwrap();

        assert!(matches!(
            LoaderConfig::from_file(&path),
            Err(PluginError::Config(_))
        ));
    }
}
