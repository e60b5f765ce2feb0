use anyhow::Context;

use crate::assets::bitmap::Bitmap;
use crate::foundation::error::{PrintstackError, PrintstackResult};

/// Largest SVG raster side we are willing to allocate.
const MAX_SVG_DIM: u32 = 8192;

/// Decode raster image bytes (PNG, JPEG, WebP, ...) into a premultiplied [`Bitmap`].
pub fn decode_image(bytes: &[u8]) -> PrintstackResult<Bitmap> {
    let dyn_img = image::load_from_memory(bytes).context("decode image from memory")?;
    Bitmap::from_rgba_image(dyn_img.to_rgba8())
}

/// Parse an SVG document and rasterize it at its intrinsic size.
pub fn decode_svg(bytes: &[u8]) -> PrintstackResult<Bitmap> {
    let opts = usvg::Options::default();
    let tree = usvg::Tree::from_data(bytes, &opts).context("parse svg tree")?;

    fn to_px(v: f32) -> PrintstackResult<u32> {
        if !v.is_finite() || v <= 0.0 {
            return Err(PrintstackError::resolution("svg has invalid width/height"));
        }
        Ok((v.ceil() as u32).max(1))
    }

    let size = tree.size();
    let width = to_px(size.width())?;
    let height = to_px(size.height())?;
    if width > MAX_SVG_DIM || height > MAX_SVG_DIM {
        return Err(PrintstackError::resolution(format!(
            "svg raster size too large: {width}x{height} (max {MAX_SVG_DIM}x{MAX_SVG_DIM})"
        )));
    }

    let mut pixmap = resvg::tiny_skia::Pixmap::new(width, height)
        .ok_or_else(|| PrintstackError::allocation("failed to allocate svg pixmap"))?;
    let sx = (width as f32) / size.width();
    let sy = (height as f32) / size.height();
    resvg::render(
        &tree,
        resvg::tiny_skia::Transform::from_scale(sx, sy),
        &mut pixmap.as_mut(),
    );

    // tiny-skia pixmaps are already premultiplied RGBA8.
    Bitmap::from_premul_rgba8(width, height, pixmap.data().to_vec())
}

/// Decode bytes as SVG or raster, using the source name and a content sniff to pick.
pub fn decode_any(bytes: &[u8], source_hint: Option<&str>) -> PrintstackResult<Bitmap> {
    if looks_like_svg(bytes, source_hint) {
        decode_svg(bytes)
    } else {
        decode_image(bytes)
    }
}

fn looks_like_svg(bytes: &[u8], source_hint: Option<&str>) -> bool {
    if let Some(hint) = source_hint {
        let lower = hint.to_ascii_lowercase();
        let path = lower.split(['?', '#']).next().unwrap_or(&lower);
        if path.ends_with(".svg") || path.ends_with(".svgz") {
            return true;
        }
    }
    let head = &bytes[..bytes.len().min(256)];
    let head = String::from_utf8_lossy(head);
    let head = head.trim_start();
    head.starts_with("<svg") || (head.starts_with("<?xml") && head.contains("<svg"))
}

#[cfg(test)]
#[path = "../../tests/unit/assets/decode.rs"]
mod tests;
