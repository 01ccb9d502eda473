//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use bundlekit_sdk::prelude::*;
use once_cell::sync::Lazy;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Write a zip archive with the given entries.
pub fn write_archive(path: &Path, entries: &[(&str, &[u8])]) {
    let mut writer = ZipWriter::new(File::create(path).unwrap());
    for (name, content) in entries {
        writer.start_file(*name, SimpleFileOptions::default()).unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap();
}

/// Write a bundle archive declaring `entry_point` and return its path.
pub fn write_bundle(root: &Path, file_name: &str, entry_point: &str) -> PathBuf {
    let path = root.join(file_name);
    let manifest = format!("entry-point = \"{entry_point}\"\nversion = \"1.0.0\"\n");
    write_archive(&path, &[("bundle.toml", manifest.as_bytes())]);
    path
}

/// Manifest of the demo bundle.
pub const DEMO_MANIFEST: &str = include_str!("../../../../demos/executable-plugin/bundle.toml");

static DEMO_LIBRARY: Lazy<PathBuf> = Lazy::new(build_demo_library);

/// The demo bundle library, built once per test binary into a target
/// directory of its own.
pub fn demo_library() -> &'static Path {
    &DEMO_LIBRARY
}

/// File name of the demo bundle library on this platform.
pub fn demo_library_name() -> String {
    format!(
        "{}executable_plugin{}",
        std::env::consts::DLL_PREFIX,
        std::env::consts::DLL_SUFFIX
    )
}

fn build_demo_library() -> PathBuf {
    let workspace = Path::new(env!("CARGO_MANIFEST_DIR")).join("../..");
    let target_dir = Path::new(env!("CARGO_TARGET_TMPDIR")).join("demo-bundle");

    let output = Command::new(env!("CARGO"))
        .current_dir(&workspace)
        .args(["build", "--offline", "-p", "executable-plugin", "--target-dir"])
        .arg(&target_dir)
        .output()
        .expect("failed to run cargo");
    assert!(
        output.status.success(),
        "building the demo bundle failed:\n{}",
        String::from_utf8_lossy(&output.stderr)
    );

    let library = target_dir.join("debug").join(demo_library_name());
    assert!(library.is_file(), "missing {}", library.display());
    library
}

/// Write the demo bundle archive into `root`, with the library under `lib/`.
pub fn write_demo_bundle(root: &Path) -> PathBuf {
    let path = root.join("ExecutablePlugin.plugin");
    let library = std::fs::read(demo_library()).unwrap();
    let library_entry = format!("lib/{}", demo_library_name());
    write_archive(
        &path,
        &[
            ("bundle.toml", DEMO_MANIFEST.as_bytes()),
            (library_entry.as_str(), library.as_slice()),
        ],
    );
    path
}

/// Write the demo bundle as a bare archive with the library copied into its
/// sibling dependency directory.
pub fn write_demo_bundle_with_sibling_library(root: &Path) -> PathBuf {
    let path = root.join("ExecutablePlugin.plugin");
    write_archive(&path, &[("bundle.toml", DEMO_MANIFEST.as_bytes())]);

    let dependencies = root.join("ExecutablePlugin");
    std::fs::create_dir_all(&dependencies).unwrap();
    std::fs::copy(demo_library(), dependencies.join(demo_library_name())).unwrap();
    path
}

/// A plugin reporting which entry point constructed it.
pub struct Tagged {
    tag: &'static str,
    props: Properties,
}

impl Tagged {
    pub fn new(tag: &'static str) -> Self {
        Self {
            tag,
            props: Properties::new(),
        }
    }
}

impl Plugin for Tagged {
    fn about(&self) -> &str {
        self.tag
    }

    fn version(&self) -> &str {
        "0.1.0"
    }

    fn properties(&self) -> &Properties {
        &self.props
    }

    fn set_properties(&mut self, props: Value) -> Result<(), PropertiesError> {
        self.props = into_properties(props)?;
        Ok(())
    }
}

/// Register a [`Tagged`] plugin whose `about()` is `tag`.
pub fn register_tagged(host: &bundlekit_core::HostNamespace, entry_point: &str, tag: &'static str) {
    host.register(entry_point, move || Box::new(Tagged::new(tag)) as Box<dyn Plugin>);
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("bundlekit_core=debug")
        .with_test_writer()
        .try_init();
}
