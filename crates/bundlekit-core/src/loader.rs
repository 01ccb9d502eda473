//! Plugin loader registry.
//!
//! The loader is built once from a set of bundle descriptors. It opens one
//! isolation context per descriptor and keys a factory for it by plugin
//! name, case-insensitively. Nothing is instantiated until
//! [`PluginLoader::load`] is called.
//!
//! ```no_run
//! use bundlekit_core::{LoaderConfig, PluginLoader};
//! use bundlekit_sdk::Plugin;
//!
//! # fn main() -> bundlekit_core::Result<()> {
//! let config = LoaderConfig::new(["/opt/app/plugins"]);
//! let loader = PluginLoader::<dyn Plugin>::from_config(&config)?;
//!
//! let plugin = loader.load("echo")?;
//! println!("{} {}", plugin.about(), plugin.version());
//!
//! loader.close();
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::bundle::{BundleDescriptor, BundleScanner};
use crate::config::LoaderConfig;
use crate::error::{PluginError, Result};
use crate::factory::PluginFactory;
use crate::instance::PluginInstance;
use crate::isolation::{HostNamespace, IsolationContext, Namespace};

/// Name-keyed registry of plugin factories.
///
/// Owns every isolation context it opened, including contexts whose name
/// was later shadowed by another bundle. [`close`](Self::close) releases
/// them all; a loader dropped without being closed closes itself and logs
/// a warning.
pub struct PluginLoader<T: ?Sized + 'static> {
    entries: Vec<(String, PluginFactory<T>)>,
    index: HashMap<String, usize>,
    contexts: Vec<Arc<IsolationContext>>,
    closed: AtomicBool,
}

impl<T: ?Sized + 'static> PluginLoader<T> {
    /// Build a loader whose contexts are parented to the global host
    /// namespace.
    pub fn new<I>(descriptors: I) -> Result<Self>
    where
        I: IntoIterator<Item = BundleDescriptor>,
    {
        Self::with_parent(HostNamespace::global(), descriptors)
    }

    /// Build a loader whose contexts are parented to `parent`.
    ///
    /// If a context cannot be opened, the contexts opened before it are
    /// released and the error is returned.
    pub fn with_parent<I>(parent: Arc<dyn Namespace>, descriptors: I) -> Result<Self>
    where
        I: IntoIterator<Item = BundleDescriptor>,
    {
        let mut entries: Vec<(String, PluginFactory<T>)> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut contexts: Vec<Arc<IsolationContext>> = Vec::new();

        for descriptor in descriptors {
            let context = match IsolationContext::open(
                descriptor.entry_point(),
                descriptor.resource_locations().iter().cloned(),
                parent.clone(),
            ) {
                Ok(context) => Arc::new(context),
                Err(e) => {
                    warn!(
                        entry_point = %descriptor.entry_point(),
                        error = %e,
                        "Failed to open isolation context, releasing {} opened so far",
                        contexts.len()
                    );
                    for context in &contexts {
                        context.release();
                    }
                    return Err(e);
                }
            };
            contexts.push(context.clone());

            let name = descriptor.plugin_name();
            let factory = PluginFactory::new(descriptor.entry_point(), context);

            match index.get(&name.to_lowercase()) {
                Some(&position) => {
                    let (kept, shadowed) = &mut entries[position];
                    debug!(
                        name = %kept,
                        shadowed = %shadowed.entry_point(),
                        by = %factory.entry_point(),
                        "Plugin name collision, later bundle wins"
                    );
                    *shadowed = factory;
                }
                None => {
                    index.insert(name.to_lowercase(), entries.len());
                    entries.push((name.to_string(), factory));
                }
            }
        }

        info!(
            plugins = entries.len(),
            contexts = contexts.len(),
            "Plugin loader ready"
        );

        Ok(Self {
            entries,
            index,
            contexts,
            closed: AtomicBool::new(false),
        })
    }

    /// Scan the configured roots and build a loader over the bundles found,
    /// parented to the global host namespace.
    pub fn from_config(config: &LoaderConfig) -> Result<Self> {
        config.validate()?;
        let descriptors = BundleScanner::from_config(config).scan()?;
        Self::new(descriptors)
    }

    /// Create a new instance of the named plugin. Names match
    /// case-insensitively.
    pub fn load(&self, name: &str) -> Result<PluginInstance<T>> {
        if name.trim().is_empty() {
            return Err(PluginError::invalid_argument("Plugin name must not be blank"));
        }
        if self.is_closed() {
            return Err(PluginError::Closed);
        }

        match self.factory(name) {
            Some(factory) => factory.create(),
            None => Err(PluginError::not_found(name, self.names())),
        }
    }

    /// Get the factory registered under a name, without instantiating.
    pub fn factory(&self, name: &str) -> Option<&PluginFactory<T>> {
        self.index
            .get(&name.to_lowercase())
            .map(|&position| &self.entries[position].1)
    }

    /// Check if a plugin is registered under a name.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(&name.to_lowercase())
    }

    /// Registered plugin names, in registration order.
    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|(name, _)| name.clone()).collect()
    }

    /// Iterate over `(name, factory)` pairs in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PluginFactory<T>)> {
        self.entries
            .iter()
            .map(|(name, factory)| (name.as_str(), factory))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Release every isolation context the loader opened. Calling this
    /// again has no effect.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        let released = self.contexts.iter().filter(|c| c.release()).count();
        info!(contexts = released, "Plugin loader closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl<'a, T: ?Sized + 'static> IntoIterator for &'a PluginLoader<T> {
    type Item = (&'a str, &'a PluginFactory<T>);
    type IntoIter = Box<dyn Iterator<Item = Self::Item> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

impl<T: ?Sized + 'static> Drop for PluginLoader<T> {
    fn drop(&mut self) {
        if !self.is_closed() {
            warn!(
                plugins = self.entries.len(),
                "Plugin loader dropped without close, releasing its contexts"
            );
            self.close();
        }
    }
}

impl<T: ?Sized + 'static> fmt::Debug for PluginLoader<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginLoader")
            .field("plugins", &self.names())
            .field("contexts", &self.contexts.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}
