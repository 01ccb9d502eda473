//! bundlekit SDK
//!
//! The contract between a host application and the plugin bundles it loads
//! with `bundlekit-core`.
//!
//! # Quick Start
//!
//! ```rust
//! use bundlekit_sdk::prelude::*;
//!
//! #[derive(Default)]
//! pub struct Hello {
//!     props: Properties,
//! }
//!
//! impl Plugin for Hello {
//!     fn about(&self) -> &str {
//!         "Says hello"
//!     }
//!
//!     fn version(&self) -> &str {
//!         "1.0.0"
//!     }
//!
//!     fn properties(&self) -> &Properties {
//!         &self.props
//!     }
//!
//!     fn set_properties(&mut self, props: Value) -> Result<(), PropertiesError> {
//!         self.props = into_properties(props)?;
//!         Ok(())
//!     }
//! }
//!
//! fn new_hello() -> Box<dyn Plugin> {
//!     Box::new(Hello::default())
//! }
//!
//! export_plugins! {
//!     "example.Hello" => new_hello,
//! }
//! ```

#[macro_use]
pub mod macros;
pub mod error;
pub mod plugin;
pub mod registrar;

pub use error::PropertiesError;
pub use plugin::{into_properties, Plugin, Properties};
pub use registrar::{
    capability_id, Constructed, Constructor, RegisterFn, Registrar, ABI_VERSION_SYMBOL,
    BUNDLE_ABI_VERSION, REGISTER_SYMBOL,
};

/// Prelude module with common imports
pub mod prelude {
    pub use crate::error::PropertiesError;
    pub use crate::export_plugins;
    pub use crate::plugin::{into_properties, Plugin, Properties};
    pub use crate::registrar::Registrar;
    pub use serde_json::Value;
}
