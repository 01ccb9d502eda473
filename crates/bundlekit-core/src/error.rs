//! Error types for bundle discovery and plugin loading.

use std::fmt;
use std::path::PathBuf;

use bundlekit_sdk::PropertiesError;

/// Errors raised by the scanner, isolation contexts and the plugin loader.
///
/// Messages never carry plugin internals: they may end up in public logs.
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    /// A configured root directory could not be listed.
    #[error("Failed to list plugin directory {}: {source}", path.display())]
    DiscoveryFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No plugin is registered under the requested name.
    #[error("No such plugin [{name}]. Available plugins are {available:?}")]
    NotFound { name: String, available: Vec<String> },

    /// The plugin is registered but could not be instantiated.
    #[error("Failed to load plugin: {0}")]
    LoadingFailed(String),

    /// A required input was missing or malformed.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The loader has been closed.
    #[error("Plugin loader is closed")]
    Closed,

    /// An isolation context could not be created for a bundle location.
    #[error("Failed to isolate bundle location {}: {reason}", location.display())]
    Isolation { location: PathBuf, reason: String },

    /// Loader configuration is invalid.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for bundle and plugin operations.
pub type Result<T> = std::result::Result<T, PluginError>;

impl PluginError {
    /// Create a not found error listing the available names.
    pub fn not_found(name: impl fmt::Display, available: Vec<String>) -> Self {
        Self::NotFound {
            name: name.to_string(),
            available,
        }
    }

    /// Create a loading failed error.
    pub fn loading_failed(msg: impl fmt::Display) -> Self {
        Self::LoadingFailed(msg.to_string())
    }

    /// Create an invalid argument error.
    pub fn invalid_argument(msg: impl fmt::Display) -> Self {
        Self::InvalidArgument(msg.to_string())
    }

    /// Create an isolation error for a bundle location.
    pub fn isolation(location: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        Self::Isolation {
            location: location.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(msg: impl fmt::Display) -> Self {
        Self::Config(msg.to_string())
    }

    /// Whether this error belongs to the plugin error family a caller is
    /// expected to handle (`NotFound`, `LoadingFailed`, `InvalidArgument`,
    /// `Closed`), as opposed to installation or configuration problems.
    pub fn is_plugin_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::LoadingFailed(_) | Self::InvalidArgument(_) | Self::Closed
        )
    }
}

impl From<PropertiesError> for PluginError {
    fn from(err: PropertiesError) -> Self {
        Self::InvalidArgument(err.to_string())
    }
}
