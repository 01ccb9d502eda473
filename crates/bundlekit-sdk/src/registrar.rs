//! Constructor registry shared between the host and bundle libraries.
//!
//! A bundle library exports a registration function (see
//! [`export_plugins!`](crate::export_plugins)) that fills a [`Registrar`]
//! with the constructors it provides, keyed by entry-point identifier. The
//! host keeps its own registrar for types that are linked in statically.

use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::mem::ManuallyDrop;
use std::sync::Arc;

/// Bundle ABI version (must match the host)
pub const BUNDLE_ABI_VERSION: u32 = 1;

/// Symbol holding the ABI version a bundle library was built against.
pub const ABI_VERSION_SYMBOL: &[u8] = b"bundlekit_abi_version";

/// Symbol of the registration function exported by a bundle library.
pub const REGISTER_SYMBOL: &[u8] = b"bundlekit_register";

/// Signature of the registration function.
///
/// Both sides use the Rust ABI, so a bundle must be compiled with the same
/// toolchain and `bundlekit-sdk` version as the host.
pub type RegisterFn = unsafe fn(&mut Registrar);

/// Type-erased zero-argument constructor.
pub type Constructor = Arc<dyn Fn() -> Constructed + Send + Sync>;

/// Capability identifier of a type: its fully qualified path.
///
/// Unlike a `TypeId`, the identifier is the same in the host and in a
/// bundle library compiled separately from the same sources.
pub fn capability_id<T: ?Sized + 'static>() -> &'static str {
    type_name::<T>()
}

/// A freshly constructed `Box<T>` with `T` erased.
///
/// Carries the `TypeId` and the capability identifier of `T`, plus the drop
/// glue of the code that built it, so a value that is never claimed is
/// freed by the library it came from.
pub struct Constructed {
    type_id: TypeId,
    capability: &'static str,
    value: *mut (),
    drop_fn: unsafe fn(*mut ()),
}

// Only built from `Box<T>` with `T: Send`.
unsafe impl Send for Constructed {}

impl Constructed {
    pub fn new<T: ?Sized + Send + 'static>(value: Box<T>) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            capability: capability_id::<T>(),
            value: Box::into_raw(Box::new(value)) as *mut (),
            drop_fn: drop_boxed::<T>,
        }
    }

    /// Capability identifier of the constructed type.
    pub fn capability(&self) -> &str {
        self.capability
    }

    /// Whether the value is a `T`, by `TypeId`.
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    /// Whether the value provides the capability `T`, by identifier.
    pub fn provides<T: ?Sized + 'static>(&self) -> bool {
        self.capability == capability_id::<T>()
    }

    /// Take the value out as a `Box<T>` if it is one, by `TypeId`.
    pub fn downcast<T: ?Sized + 'static>(self) -> Result<Box<T>, Self> {
        if !self.is::<T>() {
            return Err(self);
        }
        // Safety: `value` was made from a `Box<Box<T>>` for this very `T`.
        Ok(unsafe { self.into_box() })
    }

    /// Take the value out as a `Box<T>` if it provides the capability `T`.
    ///
    /// # Safety
    ///
    /// `TypeId`s differ between separately compiled libraries, so this only
    /// compares capability identifiers. The caller must ensure the value was
    /// built by code compiled with the same toolchain and the same sources
    /// for `T` as the caller, which is what the bundle ABI version stands
    /// for.
    pub unsafe fn downcast_capability<T: ?Sized + 'static>(self) -> Result<Box<T>, Self> {
        if !self.is::<T>() && !self.provides::<T>() {
            return Err(self);
        }
        Ok(self.into_box())
    }

    unsafe fn into_box<T: ?Sized>(self) -> Box<T> {
        let this = ManuallyDrop::new(self);
        *Box::from_raw(this.value as *mut Box<T>)
    }
}

impl Drop for Constructed {
    fn drop(&mut self) {
        unsafe { (self.drop_fn)(self.value) }
    }
}

impl fmt::Debug for Constructed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constructed")
            .field("capability", &self.capability)
            .finish()
    }
}

unsafe fn drop_boxed<T: ?Sized>(value: *mut ()) {
    drop(Box::from_raw(value as *mut Box<T>));
}

/// Entry-point identifier to constructor table.
#[derive(Clone, Default)]
pub struct Registrar {
    constructors: HashMap<String, Constructor>,
}

impl Registrar {
    /// Create an empty registrar.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor under an entry-point identifier.
    ///
    /// A later registration for the same identifier replaces the earlier one.
    pub fn register<T, F>(&mut self, identifier: impl Into<String>, constructor: F) -> &mut Self
    where
        T: ?Sized + Send + 'static,
        F: Fn() -> Box<T> + Send + Sync + 'static,
    {
        let erased: Constructor = Arc::new(move || Constructed::new(constructor()));
        self.constructors.insert(identifier.into(), erased);
        self
    }

    /// Look up the constructor registered for `identifier`.
    pub fn get(&self, identifier: &str) -> Option<Constructor> {
        self.constructors.get(identifier).cloned()
    }

    /// Check if a constructor is registered for `identifier`.
    pub fn contains(&self, identifier: &str) -> bool {
        self.constructors.contains_key(identifier)
    }

    /// Registered identifiers, in no particular order.
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }

    /// Move every constructor of `other` into this registrar.
    pub fn merge(&mut self, other: Registrar) {
        self.constructors.extend(other.constructors);
    }

    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }
}

impl fmt::Debug for Registrar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut identifiers: Vec<_> = self.identifiers().collect();
        identifiers.sort_unstable();
        f.debug_struct("Registrar")
            .field("identifiers", &identifiers)
            .finish()
    }
}
