//! The capability contract every loaded plugin satisfies.

use serde_json::{Map, Value};

use crate::error::PropertiesError;

/// Caller-supplied configuration handed to a plugin after construction.
pub type Properties = Map<String, Value>;

/// Capability shared by every plugin, independent of what the plugin does.
///
/// Hosts normally extend it with their own trait and load bundles as that
/// trait object:
///
/// ```rust
/// use bundlekit_sdk::prelude::*;
///
/// pub trait Executable: Plugin {
///     fn execute(&self, arg: &str) -> String;
/// }
/// ```
pub trait Plugin: Send {
    /// Human readable description of the plugin. Must not fail.
    fn about(&self) -> &str;

    /// Plugin version. Must not fail.
    fn version(&self) -> &str;

    /// Properties injected by the host, empty until [`Plugin::set_properties`]
    /// has been called.
    fn properties(&self) -> &Properties;

    /// Replace the plugin properties.
    ///
    /// Used by the host to pass environment-dependent values to the plugin.
    /// Implementations should go through [`into_properties`] so that `null`
    /// and non-object documents are rejected consistently.
    fn set_properties(&mut self, props: Value) -> Result<(), PropertiesError>;
}

/// Validate a properties document.
///
/// `null` is treated as an absent document.
pub fn into_properties(value: Value) -> Result<Properties, PropertiesError> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Err(PropertiesError::Absent),
        Value::Bool(_) => Err(PropertiesError::NotAnObject("boolean")),
        Value::Number(_) => Err(PropertiesError::NotAnObject("number")),
        Value::String(_) => Err(PropertiesError::NotAnObject("string")),
        Value::Array(_) => Err(PropertiesError::NotAnObject("array")),
    }
}
