/// Convenience result type used across printstack.
pub type PrintstackResult<T> = Result<T, PrintstackError>;

/// Top-level error taxonomy used by engine APIs.
///
/// Per-layer problems (a print that fails to load, a missing font) are not errors at the request
/// level; they surface as [`crate::CompositeWarning`] values on the composite result.
#[derive(thiserror::Error, Debug)]
pub enum PrintstackError {
    /// Invalid request, layer, or configuration data.
    #[error("validation error: {0}")]
    Validation(String),

    /// A raster buffer could not be sized or allocated.
    #[error("allocation error: {0}")]
    Allocation(String),

    /// An image reference could not be fetched or decoded.
    #[error("resolution error: {0}")]
    Resolution(String),

    /// A composite finished after a newer request for the same component replaced it.
    #[error("composite superseded for component '{component_id}'")]
    Superseded {
        /// Component whose newer request won.
        component_id: String,
    },

    /// Pixel access on a texture handle that has already been disposed.
    #[error("texture handle {0} is disposed")]
    Disposed(u64),

    /// Errors when serializing or deserializing data structures.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PrintstackError {
    /// Build a [`PrintstackError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`PrintstackError::Allocation`] value.
    pub fn allocation(msg: impl Into<String>) -> Self {
        Self::Allocation(msg.into())
    }

    /// Build a [`PrintstackError::Resolution`] value.
    pub fn resolution(msg: impl Into<String>) -> Self {
        Self::Resolution(msg.into())
    }

    /// Build a [`PrintstackError::Superseded`] value.
    pub fn superseded(component_id: impl Into<String>) -> Self {
        Self::Superseded {
            component_id: component_id.into(),
        }
    }

    /// Build a [`PrintstackError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// Return `true` for the non-fatal supersession outcome.
    pub fn is_superseded(&self) -> bool {
        matches!(self, Self::Superseded { .. })
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
