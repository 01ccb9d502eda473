//! Plugin bundle discovery, isolation and loading.
//!
//! ```text
//! BundleScanner ──► BundleDescriptor ──► PluginLoader
//!                                          │ one per descriptor
//!                                          ▼
//!                                   IsolationContext ◄── PluginFactory
//!                                          │                 │ create()
//!                                          ▼                 ▼
//!                                   HostNamespace     PluginInstance<T>
//! ```
//!
//! Bundles are zip archives carrying a `bundle.toml` manifest and native
//! libraries built with `bundlekit-sdk`. See [`loader`] for an example.

pub mod bundle;
pub mod config;
pub mod error;
pub mod factory;
pub mod instance;
pub mod isolation;
pub mod loader;

pub use bundle::{plugin_name, BundleDescriptor, BundleManifest, BundleScanner, ManifestError};
pub use config::LoaderConfig;
pub use error::{PluginError, Result};
pub use factory::PluginFactory;
pub use instance::PluginInstance;
pub use isolation::{
    HostNamespace, IsolationContext, LibrarySet, Namespace, Resolution, ResolutionOrigin, Resolved,
};
pub use loader::PluginLoader;

/// Re-exports commonly used types.
pub mod prelude {
    pub use crate::bundle::{BundleDescriptor, BundleScanner};
    pub use crate::config::LoaderConfig;
    pub use crate::error::{PluginError, Result};
    pub use crate::isolation::HostNamespace;
    pub use crate::loader::PluginLoader;

    pub use bundlekit_sdk::prelude::*;
}
