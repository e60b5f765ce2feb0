use std::time::Duration;

/// Why a single layer (or the base texture) was left out of a composite.
#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq)]
pub enum LayerFailure {
    /// Fetching or decoding the image failed.
    #[error("image load failed: {0}")]
    Load(String),
    /// The image did not resolve within the configured timeout.
    #[error("image load timed out after {0:?}")]
    Timeout(Duration),
    /// Text shaping or glyph drawing failed (for example an unregistered font family).
    #[error("rasterization failed: {0}")]
    Rasterize(String),
    /// The layer's own parameters cannot be drawn.
    #[error("invalid layer: {0}")]
    Invalid(String),
}

/// Non-fatal problem attached to a composite result.
#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq)]
pub enum CompositeWarning {
    /// A layer was skipped; the rest of the stack was still composited.
    #[error("layer '{layer_id}' skipped: {failure}")]
    Layer {
        /// Id of the skipped layer.
        layer_id: String,
        /// What went wrong.
        failure: LayerFailure,
    },
    /// The base texture could not be drawn; the neutral fill was used instead.
    #[error("base texture '{identity}' replaced by fill: {failure}")]
    Base {
        /// Identity of the base texture.
        identity: String,
        /// What went wrong.
        failure: LayerFailure,
    },
}

impl CompositeWarning {
    /// Id of the skipped layer, if this warning concerns a layer.
    pub fn layer_id(&self) -> Option<&str> {
        match self {
            Self::Layer { layer_id, .. } => Some(layer_id),
            Self::Base { .. } => None,
        }
    }

    /// Underlying failure.
    pub fn failure(&self) -> &LayerFailure {
        match self {
            Self::Layer { failure, .. } | Self::Base { failure, .. } => failure,
        }
    }
}
