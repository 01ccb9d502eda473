//! Lazy plugin instantiation.

use std::fmt;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use bundlekit_sdk::capability_id;
use tracing::warn;

use crate::error::{PluginError, Result};
use crate::instance::PluginInstance;
use crate::isolation::{IsolationContext, Resolved};

/// Creates instances of one entry point within one isolation context.
///
/// Nothing is constructed until [`create`](Self::create) is called, and
/// every call constructs a fresh instance.
pub struct PluginFactory<T: ?Sized> {
    entry_point: String,
    context: Arc<IsolationContext>,
    _marker: PhantomData<fn() -> Box<T>>,
}

impl<T: ?Sized + 'static> PluginFactory<T> {
    /// Create a factory for an entry point resolved in `context`.
    pub fn new(entry_point: impl Into<String>, context: Arc<IsolationContext>) -> Self {
        Self {
            entry_point: entry_point.into(),
            context,
            _marker: PhantomData,
        }
    }

    /// Fully qualified entry-point identifier.
    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    /// The isolation context the entry point is resolved in.
    pub fn context(&self) -> &Arc<IsolationContext> {
        &self.context
    }

    /// Construct a new instance.
    ///
    /// Fails with [`PluginError::Closed`] once the context has been
    /// released. An entry point that cannot be resolved, a constructor that
    /// panics, or one that does not produce a `T` all fail with
    /// [`PluginError::LoadingFailed`]; the cause is logged, not returned.
    pub fn create(&self) -> Result<PluginInstance<T>> {
        let Some(resolution) = self.context.lookup(&self.entry_point)? else {
            warn!(entry_point = %self.entry_point, "Entry point not found in bundle or host");
            return Err(self.loading_failed());
        };

        let Resolved { constructor, pin } = resolution.resolved;
        let constructed = panic::catch_unwind(AssertUnwindSafe(|| constructor()));
        drop(constructor);

        let value = match constructed {
            Ok(value) => value,
            Err(_) => {
                warn!(entry_point = %self.entry_point, "Plugin constructor panicked");
                return Err(self.loading_failed());
            }
        };

        let claimed = if pin.is_some() {
            // Safety: the library passed the ABI version check when it was
            // loaded, and `pin` keeps its code mapped.
            unsafe { value.downcast_capability::<T>() }
        } else {
            value.downcast::<T>()
        };

        match claimed {
            Ok(instance) => Ok(PluginInstance::new(instance, pin)),
            Err(rejected) => {
                warn!(
                    entry_point = %self.entry_point,
                    origin = ?resolution.origin,
                    expected = capability_id::<T>(),
                    provided = rejected.capability(),
                    "Entry point does not provide the expected capability"
                );
                drop(rejected);
                Err(self.loading_failed())
            }
        }
    }

    fn loading_failed(&self) -> PluginError {
        PluginError::loading_failed(format!("Cannot instantiate {}", self.entry_point))
    }
}

impl<T: ?Sized> Clone for PluginFactory<T> {
    fn clone(&self) -> Self {
        Self {
            entry_point: self.entry_point.clone(),
            context: self.context.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: ?Sized> fmt::Debug for PluginFactory<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginFactory")
            .field("entry_point", &self.entry_point)
            .field("context", &self.context.label())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isolation::{HostNamespace, Namespace};
    use bundlekit_sdk::Registrar;

    trait Shape: Send {
        fn sides(&self) -> u32;
    }

    struct Square;

    impl Shape for Square {
        fn sides(&self) -> u32 {
            4
        }
    }

    struct Triangle;

    impl Shape for Triangle {
        fn sides(&self) -> u32 {
            3
        }
    }

    fn factory(own: Registrar, host: HostNamespace, entry_point: &str) -> PluginFactory<dyn Shape> {
        let parent: Arc<dyn Namespace> = Arc::new(host);
        let context = IsolationContext::from_registrar(entry_point, own, parent);
        PluginFactory::new(entry_point, Arc::new(context))
    }

    #[test]
    fn test_create_from_own_namespace() {
        let mut own = Registrar::new();
        own.register("shapes.Square", || Box::new(Square) as Box<dyn Shape>);
        let host = HostNamespace::new();
        host.register("shapes.Square", || Box::new(Triangle) as Box<dyn Shape>);

        let factory = factory(own, host, "shapes.Square");
        let shape = factory.create().unwrap();
        assert_eq!(shape.sides(), 4);
        assert!(shape.is_from_bundle());
    }

    #[test]
    fn test_create_from_parent() {
        let host = HostNamespace::new();
        host.register("shapes.Triangle", || Box::new(Triangle) as Box<dyn Shape>);

        let factory = factory(Registrar::new(), host, "shapes.Triangle");
        let shape = factory.create().unwrap();
        assert_eq!(shape.sides(), 3);
        assert!(!shape.is_from_bundle());
    }

    #[test]
    fn test_unresolvable_entry_point() {
        let factory = factory(Registrar::new(), HostNamespace::new(), "shapes.Circle");
        assert!(matches!(factory.create(), Err(PluginError::LoadingFailed(_))));
    }

    #[test]
    fn test_wrong_capability() {
        let host = HostNamespace::new();
        host.register("shapes.Square", || Box::new("not a shape".to_string()));

        let factory = factory(Registrar::new(), host, "shapes.Square");
        assert!(matches!(factory.create(), Err(PluginError::LoadingFailed(_))));
    }

    #[test]
    fn test_wrong_capability_in_bundle() {
        let mut own = Registrar::new();
        own.register("shapes.Square", || Box::new(Square));

        let factory = factory(own, HostNamespace::new(), "shapes.Square");
        assert!(matches!(factory.create(), Err(PluginError::LoadingFailed(_))));
    }

    #[test]
    fn test_panicking_constructor() {
        let host = HostNamespace::new();
        host.register::<dyn Shape, _>("shapes.Broken", || panic!("constructor failure"));

        let factory = factory(Registrar::new(), host, "shapes.Broken");
        let err = factory.create().err().unwrap();
        assert!(matches!(err, PluginError::LoadingFailed(_)));
        assert!(!err.to_string().contains("constructor failure"));
    }

    #[test]
    fn test_create_after_release() {
        let host = HostNamespace::new();
        host.register("shapes.Square", || Box::new(Square) as Box<dyn Shape>);

        let factory = factory(Registrar::new(), host, "shapes.Square");
        let clone = factory.clone();
        assert!(factory.context().release());

        assert!(matches!(clone.create(), Err(PluginError::Closed)));
    }
}
