//! Demo bundle
//!
//! Exports `com.example.ExecutablePlugin$Impl` at the `ExecutablePlugin`
//! capability from `executable-api`, which the host loads it as.
//!
//! # Packaging
//!
//! ```text
//! cargo build -p executable-plugin --release
//! mkdir -p lib && cp target/release/libexecutable_plugin.so lib/
//! zip ExecutablePlugin.plugin bundle.toml lib/libexecutable_plugin.so
//! bundlekit inspect ExecutablePlugin.plugin
//! ```
//!
//! The host and the bundle must be built with the same toolchain from the
//! same `bundlekit-sdk` and `executable-api` sources.

use bundlekit_sdk::prelude::*;
use executable_api::{ExecutablePlugin, ENTRY_POINT};

/// Formats its argument together with its own metadata.
#[derive(Default)]
pub struct Impl {
    props: Properties,
}

impl Plugin for Impl {
    fn about(&self) -> &str {
        "For testing"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn properties(&self) -> &Properties {
        &self.props
    }

    fn set_properties(&mut self, props: Value) -> Result<(), PropertiesError> {
        self.props = into_properties(props)?;
        Ok(())
    }
}

impl ExecutablePlugin for Impl {
    fn execute(&self, argument: &str) -> String {
        let name = self
            .props
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default();
        format!(
            "Argument: {argument}, About: {}, Version: {}, Property[name]: {name}",
            self.about(),
            self.version()
        )
    }
}

fn new_impl() -> Box<dyn ExecutablePlugin> {
    Box::new(Impl::default())
}

export_plugins! {
    ENTRY_POINT => new_impl,
}
