//! The host namespace.

use std::sync::Arc;

use bundlekit_sdk::Registrar;
use once_cell::sync::Lazy;
use parking_lot::RwLock;

use super::{Namespace, Resolved};

static GLOBAL_HOST: Lazy<Arc<HostNamespace>> = Lazy::new(|| Arc::new(HostNamespace::new()));

/// Constructors linked into the host process.
///
/// This is the parent of every isolation context unless a loader is built
/// with an explicit parent. Anything a bundle does not provide itself is
/// looked up here.
#[derive(Debug, Default)]
pub struct HostNamespace {
    registrar: RwLock<Registrar>,
}

impl HostNamespace {
    /// Create an empty host namespace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a host namespace from an existing registrar.
    pub fn with_registrar(registrar: Registrar) -> Self {
        Self {
            registrar: RwLock::new(registrar),
        }
    }

    /// The process-wide host namespace.
    pub fn global() -> Arc<HostNamespace> {
        GLOBAL_HOST.clone()
    }

    /// Register a constructor linked into the host.
    pub fn register<T, F>(&self, identifier: impl Into<String>, constructor: F) -> &Self
    where
        T: ?Sized + Send + 'static,
        F: Fn() -> Box<T> + Send + Sync + 'static,
    {
        self.registrar.write().register(identifier, constructor);
        self
    }

    /// Check if an identifier is registered.
    pub fn contains(&self, identifier: &str) -> bool {
        self.registrar.read().contains(identifier)
    }
}

impl Namespace for HostNamespace {
    fn resolve(&self, identifier: &str) -> Option<Resolved> {
        self.registrar.read().get(identifier).map(Resolved::new)
    }
}
