//! Plugin Execution Test
//!
//! Discovers the demo bundle on disk, loads its entry point from the
//! bundle's own library, configures it and runs it.

mod common;

use bundlekit_core::{LoaderConfig, PluginLoader, ResolutionOrigin};
use bundlekit_sdk::prelude::*;
use executable_api::{ExecutablePlugin, ENTRY_POINT};
use serde_json::json;

#[test]
fn test_execute_plugin() {
    common::init_tracing();
    let root = tempfile::tempdir().unwrap();
    common::write_demo_bundle(root.path());

    let config = LoaderConfig::new([root.path()]);
    let loader = PluginLoader::<dyn ExecutablePlugin>::from_config(&config).unwrap();

    let mut plugin = loader.load("ExecutablePlugin$Impl").unwrap();
    assert!(plugin.is_from_bundle());
    plugin.set_properties(json!({"name": "Project-K"})).unwrap();

    assert_eq!(
        plugin.execute("hello"),
        "Argument: hello, About: For testing, Version: 1.0.0, Property[name]: Project-K"
    );

    let factory = loader.factory("executableplugin$impl").unwrap();
    let resolution = factory.context().lookup(ENTRY_POINT).unwrap().unwrap();
    assert_eq!(resolution.origin, ResolutionOrigin::Own);

    drop(plugin);
    loader.close();
}

#[test]
fn test_bundle_loaded_as_base_capability_is_rejected() {
    let root = tempfile::tempdir().unwrap();
    common::write_demo_bundle(root.path());

    let config = LoaderConfig::new([root.path()]);
    let loader = PluginLoader::<dyn Plugin>::from_config(&config).unwrap();

    let err = loader.load("ExecutablePlugin$Impl").err().unwrap();
    assert!(matches!(err, bundlekit_core::PluginError::LoadingFailed(_)));

    loader.close();
}
