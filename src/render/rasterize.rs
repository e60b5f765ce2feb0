//! Layer rasterization: one layer's source pixels, transformed into an isolated patch.
//!
//! The forward transform maps source bitmap pixels into texture space:
//!
//! ```text
//! T(anchor) * R(rotation) * T(-pivot) * S(draw_size / bitmap_size)
//! ```
//!
//! Each texture pixel inside the transformed footprint is filled by pushing its center through
//! the inverse transform and taking the nearest source pixel. Sampling is exact and deterministic;
//! nothing is filtered.

use std::sync::Arc;

use rayon::prelude::*;

use crate::assets::bitmap::Bitmap;
use crate::foundation::core::{Affine, Point, Rect};
use crate::foundation::error::{PrintstackError, PrintstackResult};
use crate::foundation::math::{mul_div255_u8, unit_to_u8_scale};
use crate::render::raster::{LayerPatch, rgba8_byte_len};
use crate::scene::layer::{ImageLayer, PrintLayer, TextAlign};

/// A decoded layer source with its on-texture size and pivot.
#[derive(Clone, Debug)]
pub struct PlacedSource {
    /// Pixels to draw.
    pub bitmap: Arc<Bitmap>,
    /// Drawn width in texture pixels, before rotation.
    pub draw_width: f64,
    /// Drawn height in texture pixels, before rotation.
    pub draw_height: f64,
    /// Point of the drawn rectangle that lands on the layer anchor (draw-space pixels).
    pub pivot: Point,
}

impl PlacedSource {
    /// Place an image print.
    ///
    /// The natural size is the declared size when given (a single declared side keeps the
    /// bitmap's aspect ratio), the decoded size otherwise. The drawn width is
    /// `min(natural_width * scale, max_width_px)`, and the height follows the natural aspect.
    pub fn for_image(
        bitmap: Arc<Bitmap>,
        image: &ImageLayer,
        scale: f64,
        max_width_px: f64,
    ) -> Self {
        let bw = f64::from(bitmap.width());
        let bh = f64::from(bitmap.height());
        let (nw, nh) = match (image.width, image.height) {
            (Some(w), Some(h)) => (f64::from(w), f64::from(h)),
            (Some(w), None) => (f64::from(w), f64::from(w) * bh / bw),
            (None, Some(h)) => (f64::from(h) * bw / bh, f64::from(h)),
            (None, None) => (bw, bh),
        };
        let draw_width = (nw * scale).min(max_width_px);
        let draw_height = nh * draw_width / nw;
        Self {
            bitmap,
            draw_width,
            draw_height,
            pivot: Point::new(draw_width * 0.5, draw_height * 0.5),
        }
    }

    /// Place an already-scaled text raster, anchored per `align` and vertically centered.
    pub fn for_text(bitmap: Arc<Bitmap>, align: TextAlign) -> Self {
        let w = f64::from(bitmap.width());
        let h = f64::from(bitmap.height());
        Self {
            bitmap,
            draw_width: w,
            draw_height: h,
            pivot: Point::new(align.anchor_x(w), h * 0.5),
        }
    }

    /// Source-pixel to texture-pixel transform for a layer anchored at `anchor`.
    pub fn transform(&self, anchor: Point, rotation_degrees: f64) -> Affine {
        let sx = self.draw_width / f64::from(self.bitmap.width());
        let sy = self.draw_height / f64::from(self.bitmap.height());
        Affine::translate(anchor.to_vec2())
            * Affine::rotate(rotation_degrees.to_radians())
            * Affine::translate(-self.pivot.to_vec2())
            * Affine::scale_non_uniform(sx, sy)
    }
}

/// Footprint and inverse mapping of one layer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct PatchPlan {
    pub(crate) x: u32,
    pub(crate) y: u32,
    pub(crate) width: u32,
    pub(crate) height: u32,
    inverse: Affine,
    alpha_scale: u16,
}

/// Work out where `layer` lands. `None` when it is fully off-texture, fully transparent, or
/// has a degenerate size.
pub(crate) fn plan_patch(
    layer: &PrintLayer,
    placed: &PlacedSource,
    texture_size: u32,
) -> Option<PatchPlan> {
    if !(placed.draw_width.is_finite()
        && placed.draw_height.is_finite()
        && placed.draw_width > 0.0
        && placed.draw_height > 0.0)
    {
        return None;
    }
    let alpha_scale = unit_to_u8_scale(layer.clamped_opacity() as f32);
    if alpha_scale == 0 {
        return None;
    }

    let anchor = layer.position.to_pixels(texture_size);
    let fwd = placed.transform(anchor, layer.normalized_rotation());
    let src = Rect::new(
        0.0,
        0.0,
        f64::from(placed.bitmap.width()),
        f64::from(placed.bitmap.height()),
    );
    let bbox = fwd.transform_rect_bbox(src);

    let size = f64::from(texture_size);
    let x0 = bbox.x0.floor().clamp(0.0, size);
    let y0 = bbox.y0.floor().clamp(0.0, size);
    let x1 = bbox.x1.ceil().clamp(0.0, size);
    let y1 = bbox.y1.ceil().clamp(0.0, size);
    if !(x1 > x0 && y1 > y0) {
        return None;
    }

    Some(PatchPlan {
        x: x0 as u32,
        y: y0 as u32,
        width: (x1 - x0) as u32,
        height: (y1 - y0) as u32,
        inverse: fwd.inverse(),
        alpha_scale,
    })
}

/// Fill `pixels` (a zeroed `plan.width x plan.height` RGBA8 buffer) with the layer's samples.
pub(crate) fn paint_patch(
    plan: &PatchPlan,
    placed: &PlacedSource,
    mut pixels: Vec<u8>,
) -> PrintstackResult<LayerPatch> {
    let row_bytes = plan.width as usize * 4;
    if pixels.len() != row_bytes * plan.height as usize {
        return Err(PrintstackError::validation(
            "scratch buffer does not match patch footprint",
        ));
    }

    let bitmap = &placed.bitmap;
    let inv = plan.inverse;
    let alpha_scale = plan.alpha_scale;
    pixels
        .par_chunks_mut(row_bytes)
        .enumerate()
        .for_each(|(row, out)| {
            let ty = f64::from(plan.y) + row as f64 + 0.5;
            for (col, px) in out.chunks_exact_mut(4).enumerate() {
                let tx = f64::from(plan.x) + col as f64 + 0.5;
                let p = inv * Point::new(tx, ty);
                let sx = p.x.floor();
                let sy = p.y.floor();
                if !(sx.is_finite() && sy.is_finite()) {
                    continue;
                }
                let mut s = bitmap.sample(sx as i64, sy as i64);
                if alpha_scale < 255 {
                    for c in &mut s {
                        *c = mul_div255_u8(u16::from(*c), alpha_scale);
                    }
                }
                px.copy_from_slice(&s);
            }
        });

    Ok(LayerPatch {
        x: plan.x,
        y: plan.y,
        width: plan.width,
        height: plan.height,
        pixels,
    })
}

/// Rasterize one layer into a freshly allocated patch.
///
/// Returns `Ok(None)` when the layer leaves no pixels on the texture. Fails only when the
/// scratch buffer cannot be allocated.
pub fn rasterize_layer(
    layer: &PrintLayer,
    placed: &PlacedSource,
    texture_size: u32,
) -> PrintstackResult<Option<LayerPatch>> {
    let Some(plan) = plan_patch(layer, placed, texture_size) else {
        return Ok(None);
    };
    let len = rgba8_byte_len(plan.width, plan.height)?;
    let mut pixels = Vec::new();
    pixels.try_reserve_exact(len).map_err(|e| {
        PrintstackError::allocation(format!(
            "cannot allocate {}x{} patch: {e}",
            plan.width, plan.height
        ))
    })?;
    pixels.resize(len, 0);
    paint_patch(&plan, placed, pixels).map(Some)
}

#[cfg(test)]
#[path = "../../tests/unit/render/rasterize.rs"]
mod tests;
