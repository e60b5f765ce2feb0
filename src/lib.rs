//! Printstack composites user prints and text onto garment base textures.
//!
//! A [`CompositeRequest`] describes one garment component: a base texture plus an ordered stack
//! of image and text layers, each placed in UV space with scale, rotation, opacity and a blend
//! mode. The engine:
//!
//! - Resolves images through an [`ImageLoader`] with per-image timeouts
//! - Rasterizes every layer into a square premultiplied RGBA8 buffer
//! - Caches finished textures in a [`CompositeCache`] keyed by a [`CompositeKey`]
//!
//! Broken layers never fail a composite; they are skipped and reported as
//! [`CompositeWarning`]s.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod assets;
mod cache;
mod effects;
mod foundation;
mod render;
mod scene;

pub use crate::foundation::config::{EngineConfig, MAX_TEXTURE_SIZE};
pub use crate::foundation::core::{Affine, Point, Rgba8Premul, Uv};
pub use crate::foundation::error::{PrintstackError, PrintstackResult};

pub use crate::effects::blend::{BlendMode, blend_channel};
pub use crate::effects::composite::{PremulRgba8, blend_onto, blend_px, over};

pub use crate::assets::bitmap::{Bitmap, ImageRef};
pub use crate::assets::color::TextColor;
pub use crate::assets::decode::{decode_any, decode_image, decode_svg};
pub use crate::assets::loader::{
    FsImageLoader, ImageLoader, ImageResolution, LoadFuture, MemoryImageLoader, resolve_images,
};
pub use crate::assets::text::{ParleyTextRasterizer, TextRasterizer};

pub use crate::scene::layer::{ImageLayer, LayerKind, PrintLayer, TextAlign, TextLayer};
pub use crate::scene::request::{BaseTexture, CompositeRequest, NO_BASE_IDENTITY};

pub use crate::render::compositor::{ComposeOutput, Compositor, ResolvedImages, Warnings};
pub use crate::render::raster::{LayerPatch, RasterBuffer};
pub use crate::render::rasterize::{PlacedSource, rasterize_layer};
pub use crate::render::surface_pool::{ScratchPoolOpts, ScratchPoolStats};
pub use crate::render::warning::{CompositeWarning, LayerFailure};

pub use crate::cache::evictor::Evictor;
pub use crate::cache::fingerprint::CompositeKey;
pub use crate::cache::handle::TextureHandle;
pub use crate::cache::manager::{
    CacheStats, CacheStatus, Composite, CompositeCache, UncachedComposite,
};
