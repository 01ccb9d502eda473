//! Isolation contexts.
//!
//! Every bundle gets a private namespace holding the constructors provided
//! by its own libraries. Lookups are answered in two explicit steps:
//!
//! ```text
//! ┌──────────────────────────────┐
//! │ IsolationContext (own)       │  1. libraries of the bundle, in
//! │  archive lib/*.so            │     resource-location order
//! │  sibling dir *.so            │
//! └──────────────┬───────────────┘
//!                │ not found
//!                ▼
//! ┌──────────────────────────────┐
//! │ parent Namespace             │  2. the host (HostNamespace::global()
//! │                              │     unless the caller chose another)
//! └──────────────────────────────┘
//! ```
//!
//! Isolation here is about name collisions between bundles, not security:
//! bundle code runs in-process with the host's privileges.

mod context;
pub mod host;
pub mod native;

use std::fmt;
use std::sync::Arc;

use bundlekit_sdk::{Constructed, Constructor};

pub use context::IsolationContext;
pub use host::HostNamespace;
pub use native::LibrarySet;

/// Something entry-point identifiers can be resolved against.
pub trait Namespace: Send + Sync {
    /// Resolve an identifier to a constructor, `None` if unknown here.
    fn resolve(&self, identifier: &str) -> Option<Resolved>;
}

/// A resolved constructor together with the libraries its code lives in.
#[derive(Clone)]
pub struct Resolved {
    pub(crate) constructor: Constructor,
    pub(crate) pin: Option<Arc<LibrarySet>>,
}

impl Resolved {
    /// A constructor linked into the host; nothing needs to stay loaded.
    pub fn new(constructor: Constructor) -> Self {
        Self {
            constructor,
            pin: None,
        }
    }

    /// Whether the constructor lives in a bundle library.
    pub fn is_pinned(&self) -> bool {
        self.pin.is_some()
    }

    pub(crate) fn pinned(constructor: Constructor, libraries: Arc<LibrarySet>) -> Self {
        Self {
            constructor,
            pin: Some(libraries),
        }
    }

    /// Run the constructor.
    pub fn construct(&self) -> Constructed {
        (self.constructor)()
    }
}

impl fmt::Debug for Resolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolved")
            .field("pinned", &self.pin.is_some())
            .finish()
    }
}

/// Which level of the lookup chain answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionOrigin {
    /// The bundle's own libraries
    Own,
    /// The parent namespace
    Parent,
}

/// Result of resolving an identifier in an isolation context.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub origin: ResolutionOrigin,
    pub resolved: Resolved,
}
