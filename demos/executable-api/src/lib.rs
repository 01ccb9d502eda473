//! Capability of the executable demo bundle.
//!
//! Hosts load the bundle as `dyn ExecutablePlugin`; the bundle exports its
//! constructor at that same type. Both sides depend on this crate so the
//! capability identifier they compare is the same.

use bundlekit_sdk::Plugin;

/// Entry point declared by the demo bundle's manifest.
pub const ENTRY_POINT: &str = "com.example.ExecutablePlugin$Impl";

/// A plugin that can be run with a single argument.
pub trait ExecutablePlugin: Plugin {
    fn execute(&self, argument: &str) -> String;
}
