//! Bundle manifest parsing.
//!
//! Every bundle archive carries a TOML manifest entry declaring the entry
//! point of the plugin it provides:
//!
//! ```toml
//! entry-point = "com.example.ExecutablePlugin$Impl"
//! name = "Executable plugin"
//! version = "1.0.0"
//! ```

use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;

use serde::Deserialize;
use zip::ZipArchive;

/// Parsed bundle manifest. Unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BundleManifest {
    /// Identifier of the constructible entry point.
    pub entry_point: Option<String>,

    /// Display name
    pub name: Option<String>,

    /// Bundle version
    pub version: Option<String>,

    /// Description
    pub description: Option<String>,
}

/// Reasons an archive is not a valid bundle.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("Cannot open archive: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not a readable archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Archive has no manifest entry {0}")]
    MissingManifest(String),

    #[error("Malformed manifest: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Manifest declares no entry-point")]
    MissingEntryPoint,
}

impl BundleManifest {
    /// Parse manifest text.
    pub fn parse(content: &str) -> Result<Self, ManifestError> {
        Ok(toml::from_str(content)?)
    }

    /// Read the manifest entry of an opened archive.
    pub fn from_archive<R: Read + Seek>(
        archive: &mut ZipArchive<R>,
        entry: &str,
    ) -> Result<Self, ManifestError> {
        let mut file = match archive.by_name(entry) {
            Ok(file) => file,
            Err(zip::result::ZipError::FileNotFound) => {
                return Err(ManifestError::MissingManifest(entry.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        let mut content = String::new();
        file.read_to_string(&mut content)?;
        Self::parse(&content)
    }

    /// Open an archive file and read its manifest entry.
    pub fn read(path: &Path, entry: &str) -> Result<Self, ManifestError> {
        let file = File::open(path)?;
        let mut archive = ZipArchive::new(file)?;
        Self::from_archive(&mut archive, entry)
    }

    /// The declared entry point. Blank values count as absent.
    pub fn entry_point(&self) -> Option<&str> {
        self.entry_point
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// The declared entry point, or an error if the manifest has none.
    pub fn require_entry_point(&self) -> Result<&str, ManifestError> {
        self.entry_point().ok_or(ManifestError::MissingEntryPoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn archive_with(entries: &[(&str, &str)]) -> ZipArchive<Cursor<Vec<u8>>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in entries {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        let cursor = writer.finish().unwrap();
        ZipArchive::new(cursor).unwrap()
    }

    #[test]
    fn test_parse_manifest() {
        let manifest = BundleManifest::parse(
            r#"
entry-point = "com.example.Echo"
version = "1.2.0"
unknown = "ignored"
"#,
        )
        .unwrap();

        assert_eq!(manifest.entry_point(), Some("com.example.Echo"));
        assert_eq!(manifest.version.as_deref(), Some("1.2.0"));
        assert_eq!(manifest.name, None);
    }

    #[test]
    fn test_blank_entry_point_is_absent() {
        let manifest = BundleManifest::parse("entry-point = \"   \"\n").unwrap();
        assert_eq!(manifest.entry_point(), None);
        assert!(matches!(
            manifest.require_entry_point(),
            Err(ManifestError::MissingEntryPoint)
        ));
    }

    #[test]
    fn test_from_archive() {
        let mut archive = archive_with(&[("bundle.toml", "entry-point = \"a.B\"\n")]);
        let manifest = BundleManifest::from_archive(&mut archive, "bundle.toml").unwrap();
        assert_eq!(manifest.entry_point(), Some("a.B"));
    }

    #[test]
    fn test_missing_manifest_entry() {
        let mut archive = archive_with(&[("README", "nothing here")]);
        let err = BundleManifest::from_archive(&mut archive, "bundle.toml").unwrap_err();
        assert!(matches!(err, ManifestError::MissingManifest(_)));
    }

    #[test]
    fn test_malformed_manifest() {
        let mut archive = archive_with(&[("bundle.toml", "entry-point = ")]);
        let err = BundleManifest::from_archive(&mut archive, "bundle.toml").unwrap_err();
        assert!(matches!(err, ManifestError::Parse(_)));
    }
}
