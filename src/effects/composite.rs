//! Source-over compositing of a layer patch onto the accumulation buffer.
//!
//! Blend math runs on straight (un-premultiplied) channels and is folded back with the W3C
//! "source-over with blending" formula:
//!
//! ```text
//! out_a = sa + da * (1 - sa)
//! out_p = sp * (1 - da) + dp * (1 - sa) + B(cb, cs) * sa * da
//! ```

use rayon::prelude::*;

use crate::effects::blend::{
    BlendMode, color_burn, color_dodge, exclusion, hard_light, multiply, overlay, screen,
    soft_light,
};
use crate::foundation::error::{PrintstackError, PrintstackResult};
use crate::foundation::math::{add_sat_u8, mul_div255_u8};
use crate::render::raster::{LayerPatch, RasterBuffer};

/// One premultiplied RGBA8 pixel.
pub type PremulRgba8 = [u8; 4];

/// Blend `patch` onto `dst` inside the patch footprint. Pixels outside the footprint are not
/// touched.
///
/// The patch already carries the layer opacity in its alpha, so no extra opacity is applied.
pub fn blend_onto(
    dst: &mut RasterBuffer,
    patch: &LayerPatch,
    mode: BlendMode,
) -> PrintstackResult<()> {
    let x_end = patch.x.checked_add(patch.width);
    let y_end = patch.y.checked_add(patch.height);
    match (x_end, y_end) {
        (Some(xe), Some(ye)) if xe <= dst.width() && ye <= dst.height() => {}
        _ => {
            return Err(PrintstackError::validation(format!(
                "patch {}x{} at ({}, {}) exceeds {}x{} buffer",
                patch.width,
                patch.height,
                patch.x,
                patch.y,
                dst.width(),
                dst.height()
            )));
        }
    }
    let row_bytes = patch.width as usize * 4;
    if patch.pixels.len() != row_bytes * patch.height as usize {
        return Err(PrintstackError::validation(
            "patch pixel buffer does not match its footprint",
        ));
    }
    if row_bytes == 0 || patch.height == 0 {
        return Ok(());
    }

    let stride = dst.row_stride();
    let x0 = patch.x as usize * 4;
    let y0 = patch.y as usize;
    let y1 = y0 + patch.height as usize;
    let rows = &mut dst.data_mut()[y0 * stride..y1 * stride];

    rows.par_chunks_mut(stride)
        .zip(patch.pixels.par_chunks(row_bytes))
        .for_each(|(drow, srow)| blend_row(&mut drow[x0..x0 + row_bytes], srow, mode));
    Ok(())
}

/// Blend one row of equal-length premultiplied pixels.
pub(crate) fn blend_row(dst: &mut [u8], src: &[u8], mode: BlendMode) {
    // Mode dispatch happens once per row; each arm monomorphizes its own kernel.
    match mode {
        BlendMode::Normal => over_row(dst, src),
        BlendMode::Multiply => blend_row_with(dst, src, multiply),
        BlendMode::Screen => blend_row_with(dst, src, screen),
        BlendMode::Overlay => blend_row_with(dst, src, overlay),
        BlendMode::SoftLight => blend_row_with(dst, src, soft_light),
        BlendMode::HardLight => blend_row_with(dst, src, hard_light),
        BlendMode::ColorDodge => blend_row_with(dst, src, color_dodge),
        BlendMode::ColorBurn => blend_row_with(dst, src, color_burn),
        BlendMode::Darken => blend_row_with(dst, src, |cb, cs| cb.min(cs)),
        BlendMode::Lighten => blend_row_with(dst, src, |cb, cs| cb.max(cs)),
        BlendMode::Difference => blend_row_with(dst, src, |cb, cs| (cb - cs).abs()),
        BlendMode::Exclusion => blend_row_with(dst, src, exclusion),
    }
}

/// Integer premultiplied source-over.
pub fn over(dst: PremulRgba8, src: PremulRgba8) -> PremulRgba8 {
    let sa = u16::from(src[3]);
    if sa == 0 {
        return dst;
    }
    let inv = 255u16 - sa;
    let mut out = [0u8; 4];
    out[3] = add_sat_u8(src[3], mul_div255_u8(u16::from(dst[3]), inv));
    for c in 0..3 {
        let dc = mul_div255_u8(u16::from(dst[c]), inv);
        out[c] = add_sat_u8(src[c], dc);
    }
    out
}

/// Source-over with a separable blend function `blend_fn(cb, cs)`.
pub fn blend_px<F>(dst: PremulRgba8, src: PremulRgba8, blend_fn: F) -> PremulRgba8
where
    F: Fn(f32, f32) -> f32,
{
    if src[3] == 0 {
        return dst;
    }

    let sa = f32::from(src[3]) / 255.0;
    let da = f32::from(dst[3]) / 255.0;
    let inv_sa = 1.0 - sa;
    let inv_da = 1.0 - da;

    let mut out = [0u8; 4];
    for c in 0..3 {
        let sp = f32::from(src[c]) / 255.0;
        let dp = f32::from(dst[c]) / 255.0;
        let cs = (sp / sa).clamp(0.0, 1.0);
        let cb = if da > 0.0 {
            (dp / da).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let b = blend_fn(cb, cs).clamp(0.0, 1.0);
        let p = (sp * inv_da + dp * inv_sa + b * sa * da).clamp(0.0, 1.0);
        out[c] = (p * 255.0).round() as u8;
    }
    let out_a = (sa + da * inv_sa).clamp(0.0, 1.0);
    out[3] = (out_a * 255.0).round() as u8;
    out
}

fn over_row(dst: &mut [u8], src: &[u8]) {
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let out = over([d[0], d[1], d[2], d[3]], [s[0], s[1], s[2], s[3]]);
        d.copy_from_slice(&out);
    }
}

#[inline(always)]
fn blend_row_with<F>(dst: &mut [u8], src: &[u8], blend_fn: F)
where
    F: Fn(f32, f32) -> f32 + Copy,
{
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let out = blend_px([d[0], d[1], d[2], d[3]], [s[0], s[1], s[2], s[3]], blend_fn);
        d.copy_from_slice(&out);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/effects/composite.rs"]
mod tests;
