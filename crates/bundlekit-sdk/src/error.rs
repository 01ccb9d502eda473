//! Plugin property errors.

/// Error returned when a properties document is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PropertiesError {
    /// No document was supplied (`null`).
    #[error("Plugin properties are required")]
    Absent,

    /// The document is not a JSON object.
    #[error("Plugin properties must be a JSON object, got {0}")]
    NotAnObject(&'static str),
}
