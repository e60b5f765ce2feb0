use std::sync::{Arc, Mutex, PoisonError};

use smallvec::SmallVec;

use crate::assets::bitmap::Bitmap;
use crate::assets::loader::{ImageLoader, ImageResolution, resolve_images};
use crate::assets::text::TextRasterizer;
use crate::effects::composite::{blend_onto, over};
use crate::foundation::config::EngineConfig;
use crate::foundation::error::PrintstackResult;
use crate::render::raster::RasterBuffer;
use crate::render::rasterize::{PlacedSource, paint_patch, plan_patch};
use crate::render::surface_pool::{ScratchPool, ScratchPoolStats};
use crate::render::warning::{CompositeWarning, LayerFailure};
use crate::scene::layer::{LayerKind, PrintLayer};
use crate::scene::request::CompositeRequest;

/// Warnings collected while compositing one request.
pub type Warnings = SmallVec<[CompositeWarning; 2]>;

/// Image sources of a request, resolved ahead of compositing.
///
/// `layers` is indexed by insertion index, not draw order.
#[derive(Clone, Debug, Default)]
pub struct ResolvedImages {
    /// Base texture pixels, when the request has a drawable base source.
    pub base: Option<ImageResolution>,
    /// One slot per request layer; `None` for text layers.
    pub layers: Vec<Option<ImageResolution>>,
}

/// Final buffer plus the per-layer problems met on the way.
#[derive(Debug)]
pub struct ComposeOutput {
    /// The composited texture.
    pub buffer: RasterBuffer,
    /// Non-fatal problems, in draw order (base first).
    pub warnings: Warnings,
}

/// Draws a base texture and a stack of layers into one square texture.
///
/// Each layer is rasterized into an isolated patch and only then blended onto the accumulation
/// buffer, so blend modes always see exactly one foreground against the current background.
pub struct Compositor {
    config: EngineConfig,
    text: Arc<dyn TextRasterizer>,
    scratch: Mutex<ScratchPool>,
}

impl std::fmt::Debug for Compositor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compositor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Compositor {
    /// Build a compositor; the config is validated first.
    pub fn new(config: EngineConfig, text: Arc<dyn TextRasterizer>) -> PrintstackResult<Self> {
        config.validate()?;
        let scratch = Mutex::new(ScratchPool::new(config.scratch_pool));
        Ok(Self {
            config,
            text,
            scratch,
        })
    }

    /// Engine settings in use.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Scratch pool counters.
    pub fn scratch_stats(&self) -> ScratchPoolStats {
        self.scratch
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .stats()
    }

    /// Start every image load of `request` at once and wait for all of them.
    pub async fn resolve(
        &self,
        request: &CompositeRequest,
        loader: &dyn ImageLoader,
    ) -> ResolvedImages {
        let mut refs: Vec<_> = request.layers.iter().map(PrintLayer::image_ref).collect();
        let base_ref = request.base.drawable_source();
        refs.push(base_ref);

        let mut resolved = resolve_images(loader, &refs, self.config.image_timeout()).await;
        let base = resolved.pop().flatten();
        ResolvedImages {
            base,
            layers: resolved,
        }
    }

    /// Resolve images, then composite.
    #[tracing::instrument(
        level = "debug",
        skip(self, request, loader),
        fields(component = %request.component_id, layers = request.layers.len())
    )]
    pub async fn composite(
        &self,
        request: &CompositeRequest,
        loader: &dyn ImageLoader,
    ) -> PrintstackResult<ComposeOutput> {
        let resolved = self.resolve(request, loader).await;
        self.compose(request, &resolved)
    }

    /// Composite `request` from already-resolved images. Pure CPU work.
    ///
    /// Fails only when a raster buffer cannot be allocated; everything else degrades to a warning.
    pub fn compose(
        &self,
        request: &CompositeRequest,
        resolved: &ResolvedImages,
    ) -> PrintstackResult<ComposeOutput> {
        let size = self.config.texture_size;
        let mut warnings = Warnings::new();
        let mut buffer = RasterBuffer::filled(size, size, self.config.base_fill_rgba)?;

        match &resolved.base {
            Some(Ok(bitmap)) => draw_base(&mut buffer, bitmap),
            Some(Err(failure)) => {
                tracing::warn!(base = %request.base.identity, %failure, "base texture skipped");
                warnings.push(CompositeWarning::Base {
                    identity: request.base.identity.clone(),
                    failure: failure.clone(),
                });
            }
            None => {}
        }

        for (index, layer) in request.draw_order() {
            let placed = match self.place_layer(layer, resolved.layers.get(index)) {
                Ok(placed) => placed,
                Err(failure) => {
                    tracing::warn!(layer = %layer.id, %failure, "layer skipped");
                    warnings.push(CompositeWarning::Layer {
                        layer_id: layer.id.clone(),
                        failure,
                    });
                    continue;
                }
            };

            let Some(plan) = plan_patch(layer, &placed, size) else {
                tracing::debug!(layer = %layer.id, "layer leaves no pixels on the texture");
                continue;
            };
            let scratch = self
                .scratch
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .borrow(plan.width, plan.height)?;
            let patch = paint_patch(&plan, &placed, scratch)?;
            blend_onto(&mut buffer, &patch, layer.blend_mode)?;
            self.scratch
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .release(patch.width, patch.height, patch.pixels);
        }

        Ok(ComposeOutput { buffer, warnings })
    }

    fn place_layer(
        &self,
        layer: &PrintLayer,
        resolved: Option<&Option<ImageResolution>>,
    ) -> Result<PlacedSource, LayerFailure> {
        layer
            .validate()
            .map_err(|e| LayerFailure::Invalid(e.to_string()))?;

        match &layer.kind {
            LayerKind::Image(image) => {
                let bitmap = match resolved {
                    Some(Some(Ok(bitmap))) => Arc::clone(bitmap),
                    Some(Some(Err(failure))) => return Err(failure.clone()),
                    _ => {
                        return Err(LayerFailure::Load(
                            "image was not resolved for this layer".to_owned(),
                        ));
                    }
                };
                Ok(PlacedSource::for_image(
                    bitmap,
                    image,
                    layer.scale,
                    self.config.max_print_width_px(),
                ))
            }
            LayerKind::Text(text) => {
                let size_px = (text.font_size_px * layer.scale) as f32;
                let bitmap = self
                    .text
                    .rasterize(text, size_px)
                    .map_err(|e| LayerFailure::Rasterize(e.to_string()))?;
                Ok(PlacedSource::for_text(Arc::new(bitmap), text.text_align))
            }
        }
    }
}

/// Draw the base over the fill, resampling nearest-neighbour when sizes differ.
fn draw_base(buffer: &mut RasterBuffer, bitmap: &Bitmap) {
    let (w, h) = (buffer.width(), buffer.height());
    let (bw, bh) = (u64::from(bitmap.width()), u64::from(bitmap.height()));
    let stride = buffer.row_stride();
    for (y, row) in buffer.data_mut().chunks_exact_mut(stride).enumerate() {
        let sy = (y as u64 * bh / u64::from(h)) as i64;
        for (x, px) in row.chunks_exact_mut(4).enumerate() {
            let sx = (x as u64 * bw / u64::from(w)) as i64;
            let out = over([px[0], px[1], px[2], px[3]], bitmap.sample(sx, sy));
            px.copy_from_slice(&out);
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/compositor.rs"]
mod tests;
