//! Declarative macros for bundle libraries.

/// Export the registration symbols of a bundle library.
///
/// Each pair maps an entry-point identifier (the value of `entry-point` in
/// the bundle manifest) to a zero-argument constructor returning the boxed
/// capability type the host loads it as.
///
/// # Example
///
/// ```rust,ignore
/// use bundlekit_sdk::prelude::*;
///
/// fn new_impl() -> Box<dyn Executable> {
///     Box::new(Impl::default())
/// }
///
/// export_plugins! {
///     "com.example.ExecutablePlugin$Impl" => new_impl,
/// }
/// ```
#[macro_export]
macro_rules! export_plugins {
    ($($identifier:expr => $constructor:expr),+ $(,)?) => {
        #[no_mangle]
        #[allow(non_upper_case_globals)]
        pub static bundlekit_abi_version: u32 = $crate::registrar::BUNDLE_ABI_VERSION;

        #[no_mangle]
        pub fn bundlekit_register(registrar: &mut $crate::registrar::Registrar) {
            $(
                registrar.register($identifier, $constructor);
            )+
        }
    };
}
