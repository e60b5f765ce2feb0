use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::assets::bitmap::Bitmap;
use crate::foundation::error::{PrintstackError, PrintstackResult};
use crate::scene::layer::{TextAlign, TextLayer};

/// Largest text raster side.
const MAX_TEXT_DIM: f32 = 8192.0;

/// Turns a text layer into an unrotated, unscaled glyph bitmap.
///
/// `size_px` is the final font size (authored size times layer scale). Lines are aligned
/// within the bitmap according to [`TextLayer::text_align`]; the compositor derives the anchor
/// point from the same alignment, so implementations only need to produce tight pixels.
pub trait TextRasterizer: Send + Sync {
    /// Rasterize `text` at `size_px` into a premultiplied bitmap.
    fn rasterize(&self, text: &TextLayer, size_px: f32) -> PrintstackResult<Bitmap>;
}

/// Default [`TextRasterizer`]: shapes with `parley`, draws glyph runs with `vello_cpu`.
///
/// Only fonts registered through [`ParleyTextRasterizer::register_font`] are used, so output
/// does not depend on what happens to be installed on the host.
pub struct ParleyTextRasterizer {
    engine: Mutex<TextLayoutEngine>,
}

struct TextLayoutEngine {
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<TextBrushRgba8>,
    families: HashMap<String, String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct TextBrushRgba8 {
    r: u8,
    g: u8,
    b: u8,
    a: u8,
}

impl Default for ParleyTextRasterizer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ParleyTextRasterizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let families = self.family_names();
        f.debug_struct("ParleyTextRasterizer")
            .field("families", &families)
            .finish()
    }
}

impl ParleyTextRasterizer {
    /// Rasterizer with no fonts registered.
    pub fn new() -> Self {
        Self {
            engine: Mutex::new(TextLayoutEngine {
                font_ctx: parley::FontContext::default(),
                layout_ctx: parley::LayoutContext::new(),
                families: HashMap::new(),
            }),
        }
    }

    /// Register a font file (TTF/OTF/collection) and return the family names it provides.
    pub fn register_font(&self, bytes: Vec<u8>) -> PrintstackResult<Vec<String>> {
        let mut engine = self.engine.lock().unwrap_or_else(PoisonError::into_inner);
        let blob = parley::fontique::Blob::from(bytes);
        let registered = engine.font_ctx.collection.register_fonts(blob, None);
        if registered.is_empty() {
            return Err(PrintstackError::validation(
                "no font families registered from font bytes",
            ));
        }

        let mut names = Vec::with_capacity(registered.len());
        for (family_id, _) in registered {
            let Some(name) = engine.font_ctx.collection.family_name(family_id) else {
                continue;
            };
            let name = name.to_owned();
            engine
                .families
                .insert(name.to_ascii_lowercase(), name.clone());
            names.push(name);
        }
        tracing::debug!(families = ?names, "registered font");
        Ok(names)
    }

    /// Names of every registered family.
    pub fn family_names(&self) -> Vec<String> {
        let engine = self.engine.lock().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = engine.families.values().cloned().collect();
        names.sort();
        names
    }
}

impl TextRasterizer for ParleyTextRasterizer {
    fn rasterize(&self, text: &TextLayer, size_px: f32) -> PrintstackResult<Bitmap> {
        if !size_px.is_finite() || size_px <= 0.0 {
            return Err(PrintstackError::validation(
                "text size must be finite and > 0",
            ));
        }
        if text.content.trim().is_empty() {
            return Err(PrintstackError::validation("text content is empty"));
        }

        let mut guard = self.engine.lock().unwrap_or_else(PoisonError::into_inner);
        let engine = &mut *guard;
        let family_name = engine
            .families
            .get(&text.font_family.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| {
                PrintstackError::resolution(format!(
                    "font family '{}' is not registered",
                    text.font_family
                ))
            })?;

        let brush = TextBrushRgba8 {
            r: text.color.r,
            g: text.color.g,
            b: text.color.b,
            a: text.color.a,
        };
        let mut builder =
            engine
                .layout_ctx
                .ranged_builder(&mut engine.font_ctx, &text.content, 1.0, true);
        builder.push_default(parley::style::StyleProperty::FontStack(
            parley::style::FontStack::Source(std::borrow::Cow::Owned(family_name)),
        ));
        builder.push_default(parley::style::StyleProperty::FontSize(size_px));
        builder.push_default(parley::style::StyleProperty::FontWeight(
            parley::style::FontWeight::new(f32::from(text.font_weight)),
        ));
        builder.push_default(parley::style::StyleProperty::Brush(brush));

        let mut layout: parley::Layout<TextBrushRgba8> = builder.build(&text.content);
        layout.break_all_lines(None);
        let alignment = match text.text_align {
            TextAlign::Left => parley::Alignment::Start,
            TextAlign::Center => parley::Alignment::Center,
            TextAlign::Right => parley::Alignment::End,
        };
        let content_w = layout.width();
        layout.align(
            Some(content_w),
            alignment,
            parley::AlignmentOptions::default(),
        );

        let w = content_w.ceil();
        let h = layout.height().ceil();
        if !(w >= 1.0 && h >= 1.0) {
            return Err(PrintstackError::validation("text layout has no extent"));
        }
        if w > MAX_TEXT_DIM || h > MAX_TEXT_DIM {
            return Err(PrintstackError::allocation(format!(
                "text raster too large: {w}x{h}"
            )));
        }
        let (w, h) = (w as u16, h as u16);

        let mut ctx = vello_cpu::RenderContext::new(w, h);
        for line in layout.lines() {
            for item in line.items() {
                let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                    continue;
                };
                // Shaped runs share the registered blob, so glyphs draw from the same bytes.
                let font_data: vello_cpu::peniko::FontData = run.run().font().clone();
                let brush = run.style().brush;
                ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
                    brush.r, brush.g, brush.b, brush.a,
                ));
                let glyphs = run.positioned_glyphs().map(|g| vello_cpu::Glyph {
                    id: g.id,
                    x: g.x,
                    y: g.y,
                });
                ctx.glyph_run(&font_data)
                    .font_size(run.run().font_size())
                    .fill_glyphs(glyphs);
            }
        }
        ctx.flush();
        let mut pixmap = vello_cpu::Pixmap::new(w, h);
        ctx.render_to_pixmap(&mut pixmap);

        Bitmap::from_premul_rgba8(
            u32::from(w),
            u32::from(h),
            pixmap.data_as_u8_slice().to_vec(),
        )
    }
}
