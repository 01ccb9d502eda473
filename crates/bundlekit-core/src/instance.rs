//! Plugin instance handle.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use crate::isolation::LibrarySet;

/// An instance created by a [`PluginFactory`](crate::PluginFactory).
///
/// Derefs to the capability type. The native libraries the instance was
/// constructed from stay loaded for as long as the handle lives, even past
/// the owning loader's `close`.
pub struct PluginInstance<T: ?Sized> {
    // Dropped before the libraries its code lives in
    instance: Box<T>,
    pin: Option<Arc<LibrarySet>>,
}

impl<T: ?Sized> PluginInstance<T> {
    pub(crate) fn new(instance: Box<T>, pin: Option<Arc<LibrarySet>>) -> Self {
        Self { instance, pin }
    }

    /// Whether the instance was constructed by a bundle's own libraries
    /// rather than by the host.
    pub fn is_from_bundle(&self) -> bool {
        self.pin.is_some()
    }
}

impl<T: ?Sized> Deref for PluginInstance<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.instance
    }
}

impl<T: ?Sized> DerefMut for PluginInstance<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.instance
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for PluginInstance<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginInstance")
            .field("instance", &&*self.instance)
            .field("from_bundle", &self.is_from_bundle())
            .finish()
    }
}
