use std::path::Path;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::assets::bitmap::ImageRef;
use crate::foundation::error::{PrintstackError, PrintstackResult};
use crate::scene::layer::PrintLayer;

/// Identity used when a material has no base texture.
pub const NO_BASE_IDENTITY: &str = "none";

/// Base material texture drawn under every layer.
///
/// `identity` names the texture for caching and must change whenever its pixels do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseTexture {
    /// Opaque, comparable identity; `"none"` selects the neutral fill.
    pub identity: String,
    /// Pixel source; absent means the neutral fill.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<ImageRef>,
}

impl Default for BaseTexture {
    fn default() -> Self {
        Self::none()
    }
}

impl BaseTexture {
    /// No base texture: the buffer starts with the configured fill.
    pub fn none() -> Self {
        Self {
            identity: NO_BASE_IDENTITY.to_owned(),
            source: None,
        }
    }

    /// Base texture with a pixel source.
    pub fn new(identity: impl Into<String>, source: impl Into<ImageRef>) -> Self {
        Self {
            identity: identity.into(),
            source: Some(source.into()),
        }
    }

    /// Source to draw, or `None` when the neutral fill applies.
    pub fn drawable_source(&self) -> Option<&ImageRef> {
        if self.identity == NO_BASE_IDENTITY {
            return None;
        }
        self.source.as_ref()
    }
}

/// Everything needed to composite one component's texture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeRequest {
    /// Base material texture.
    #[serde(default)]
    pub base: BaseTexture,
    /// Component the texture belongs to; scopes supersession, not caching.
    #[serde(alias = "componentId")]
    pub component_id: String,
    /// Layers in insertion order.
    #[serde(default)]
    pub layers: Vec<PrintLayer>,
}

impl CompositeRequest {
    /// Request with the neutral base and no layers.
    pub fn new(component_id: impl Into<String>) -> Self {
        Self {
            base: BaseTexture::none(),
            component_id: component_id.into(),
            layers: Vec::new(),
        }
    }

    /// Replace the base texture.
    pub fn with_base(mut self, base: BaseTexture) -> Self {
        self.base = base;
        self
    }

    /// Append a layer.
    pub fn with_layer(mut self, layer: PrintLayer) -> Self {
        self.layers.push(layer);
        self
    }

    /// Layers in draw order paired with their insertion index.
    ///
    /// Sorted ascending by `z_index`; the sort is stable so equal z values keep insertion order.
    pub fn draw_order(&self) -> Vec<(usize, &PrintLayer)> {
        let mut order: Vec<(usize, &PrintLayer)> = self.layers.iter().enumerate().collect();
        order.sort_by_key(|(_, l)| l.z_index);
        order
    }

    /// Parse a JSON request.
    pub fn from_json_slice(bytes: &[u8]) -> PrintstackResult<Self> {
        let req: Self = serde_json::from_slice(bytes)
            .map_err(|e| PrintstackError::serde(format!("composite request json: {e}")))?;
        if req.component_id.trim().is_empty() {
            return Err(PrintstackError::validation("component_id must be non-empty"));
        }
        Ok(req)
    }

    /// Read and parse a JSON request file.
    pub fn from_json_path(path: &Path) -> PrintstackResult<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("read composite request '{}'", path.display()))?;
        Self::from_json_slice(&bytes)
    }
}
