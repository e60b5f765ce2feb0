use serde::{Deserialize, Serialize};

use crate::assets::bitmap::ImageRef;
use crate::assets::color::TextColor;
use crate::effects::blend::BlendMode;
use crate::foundation::core::Uv;
use crate::foundation::error::{PrintstackError, PrintstackResult};

/// One print or text layer placed on the texture.
///
/// Immutable for the duration of a composite. `position` is the layer's anchor in UV space;
/// images are anchored at their center, text according to [`TextLayer::text_align`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrintLayer {
    /// Stable identifier, reported in warnings and part of the composite key.
    pub id: String,
    /// Anchor in `[0, 1] x [0, 1]` texture space.
    #[serde(default = "Uv::center")]
    pub position: Uv,
    /// Multiplier on the layer's natural size. Must be positive.
    #[serde(default = "default_one")]
    pub scale: f64,
    /// Clockwise rotation about the anchor, in degrees.
    #[serde(default, alias = "rotationDegrees")]
    pub rotation_degrees: f64,
    /// Layer opacity; clamped to `[0, 1]` when drawn.
    #[serde(default = "default_one")]
    pub opacity: f64,
    /// How the layer combines with what is underneath.
    #[serde(default, alias = "blendMode")]
    pub blend_mode: BlendMode,
    /// Draw order; lower is drawn first. Ties keep insertion order.
    #[serde(default, alias = "zIndex")]
    pub z_index: i32,
    /// Image or text payload.
    pub kind: LayerKind,
}

fn default_one() -> f64 {
    1.0
}

/// Payload of a [`PrintLayer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    /// A raster or SVG print.
    Image(ImageLayer),
    /// A run of text.
    Text(TextLayer),
}

/// Image payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageLayer {
    /// Where the pixels come from.
    #[serde(alias = "imageRef")]
    pub image_ref: ImageRef,
    /// Declared natural width; the decoded width is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    /// Declared natural height; the decoded height is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

/// Horizontal alignment of a text run relative to its anchor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextAlign {
    /// Anchor on the left edge.
    Left,
    /// Anchor in the middle.
    #[default]
    Center,
    /// Anchor on the right edge.
    Right,
}

impl TextAlign {
    pub(crate) fn tag(self) -> u8 {
        match self {
            Self::Left => 0,
            Self::Center => 1,
            Self::Right => 2,
        }
    }

    /// Horizontal anchor offset inside a run `width` pixels wide.
    pub fn anchor_x(self, width: f64) -> f64 {
        match self {
            Self::Left => 0.0,
            Self::Center => width * 0.5,
            Self::Right => width,
        }
    }
}

/// Text payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextLayer {
    /// Text to draw; `\n` starts a new line.
    pub content: String,
    /// Registered font family name (case-insensitive).
    #[serde(alias = "fontFamily")]
    pub font_family: String,
    /// Font size before layer scale, in pixels.
    #[serde(default = "default_font_size", alias = "fontSizePx")]
    pub font_size_px: f64,
    /// CSS-style weight (400 regular, 700 bold).
    #[serde(default = "default_font_weight", alias = "fontWeight")]
    pub font_weight: u16,
    /// Fill color.
    #[serde(default)]
    pub color: TextColor,
    /// Alignment of lines and anchor.
    #[serde(default, alias = "textAlign")]
    pub text_align: TextAlign,
}

fn default_font_size() -> f64 {
    32.0
}

fn default_font_weight() -> u16 {
    400
}

impl PrintLayer {
    fn with_kind(id: impl Into<String>, kind: LayerKind) -> Self {
        Self {
            id: id.into(),
            position: Uv::center(),
            scale: 1.0,
            rotation_degrees: 0.0,
            opacity: 1.0,
            blend_mode: BlendMode::Normal,
            z_index: 0,
            kind,
        }
    }

    /// Centered, unscaled image layer.
    pub fn image(id: impl Into<String>, image_ref: impl Into<ImageRef>) -> Self {
        Self::with_kind(
            id,
            LayerKind::Image(ImageLayer {
                image_ref: image_ref.into(),
                width: None,
                height: None,
            }),
        )
    }

    /// Centered, unscaled text layer.
    pub fn text(id: impl Into<String>, text: TextLayer) -> Self {
        Self::with_kind(id, LayerKind::Text(text))
    }

    /// Set the anchor.
    pub fn at(mut self, u: f64, v: f64) -> Self {
        self.position = Uv::new(u, v);
        self
    }

    /// Set the scale.
    pub fn scaled(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    /// Set the rotation in degrees.
    pub fn rotated(mut self, degrees: f64) -> Self {
        self.rotation_degrees = degrees;
        self
    }

    /// Set the opacity.
    pub fn with_opacity(mut self, opacity: f64) -> Self {
        self.opacity = opacity;
        self
    }

    /// Set the blend mode.
    pub fn with_blend(mut self, mode: BlendMode) -> Self {
        self.blend_mode = mode;
        self
    }

    /// Set the draw order.
    pub fn with_z_index(mut self, z: i32) -> Self {
        self.z_index = z;
        self
    }

    /// Rotation folded into `[0, 360)`; non-finite values read as 0.
    pub fn normalized_rotation(&self) -> f64 {
        if !self.rotation_degrees.is_finite() {
            return 0.0;
        }
        let r = self.rotation_degrees.rem_euclid(360.0);
        // rem_euclid can round up to exactly 360 for tiny negative inputs.
        if r >= 360.0 { 0.0 } else { r }
    }

    /// Opacity clamped to `[0, 1]`.
    pub fn clamped_opacity(&self) -> f64 {
        self.opacity.clamp(0.0, 1.0)
    }

    /// The image reference, for image layers.
    pub fn image_ref(&self) -> Option<&ImageRef> {
        match &self.kind {
            LayerKind::Image(img) => Some(&img.image_ref),
            LayerKind::Text(_) => None,
        }
    }

    /// Reject parameters that cannot be drawn.
    pub fn validate(&self) -> PrintstackResult<()> {
        if !self.position.is_finite() {
            return Err(PrintstackError::validation("position must be finite"));
        }
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(PrintstackError::validation(format!(
                "scale must be finite and > 0, got {}",
                self.scale
            )));
        }
        if self.opacity.is_nan() {
            return Err(PrintstackError::validation("opacity must be a number"));
        }
        match &self.kind {
            LayerKind::Image(img) => {
                if img.width == Some(0) || img.height == Some(0) {
                    return Err(PrintstackError::validation(
                        "declared image size must be non-zero",
                    ));
                }
            }
            LayerKind::Text(text) => {
                if !text.font_size_px.is_finite() || text.font_size_px <= 0.0 {
                    return Err(PrintstackError::validation(
                        "font_size_px must be finite and > 0",
                    ));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scene/layer.rs"]
mod tests;
