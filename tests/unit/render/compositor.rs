use super::*;
use crate::assets::bitmap::ImageRef;
use crate::assets::color::TextColor;
use crate::assets::loader::MemoryImageLoader;
use crate::effects::blend::BlendMode;
use crate::foundation::core::Rgba8Premul;
use crate::foundation::error::PrintstackError;
use crate::scene::layer::{TextAlign, TextLayer};
use crate::scene::request::BaseTexture;

const WHITE: [u8; 4] = [255, 255, 255, 255];
const RED: [u8; 4] = [255, 0, 0, 255];

/// Paints every text run as a solid block: half an em wide per character, one em tall.
struct BlockText;

impl TextRasterizer for BlockText {
    fn rasterize(&self, text: &TextLayer, size_px: f32) -> PrintstackResult<Bitmap> {
        if text.font_family == "missing" {
            return Err(PrintstackError::resolution("font family 'missing' is not registered"));
        }
        let w = (text.content.chars().count() as f32 * size_px * 0.5).ceil() as u32;
        let h = size_px.ceil() as u32;
        Bitmap::solid(w, h, text.color.to_rgba8_premul())
    }
}

fn compositor(size: u32) -> Compositor {
    let config = EngineConfig {
        texture_size: size,
        max_print_fraction: 1.0,
        ..EngineConfig::default()
    };
    Compositor::new(config, Arc::new(BlockText)).unwrap()
}

fn solid(w: u32, h: u32, px: [u8; 4]) -> Bitmap {
    Bitmap::solid(w, h, Rgba8Premul::from_straight_rgba(px[0], px[1], px[2], px[3])).unwrap()
}

fn text(content: &str, family: &str, color: TextColor) -> TextLayer {
    TextLayer {
        content: content.to_owned(),
        font_family: family.to_owned(),
        font_size_px: 4.0,
        font_weight: 400,
        color,
        text_align: TextAlign::Center,
    }
}

#[test]
fn rejects_invalid_config() {
    let config = EngineConfig {
        texture_size: 0,
        ..EngineConfig::default()
    };
    assert!(Compositor::new(config, Arc::new(BlockText)).is_err());
}

#[tokio::test]
async fn empty_request_is_the_neutral_fill() {
    let c = compositor(8);
    let loader = MemoryImageLoader::new();
    let out = c.composite(&CompositeRequest::new("shirt"), &loader).await.unwrap();
    assert!(out.warnings.is_empty());
    assert!(out.buffer.data().chunks_exact(4).all(|p| p == WHITE));
}

#[tokio::test]
async fn base_is_resampled_to_the_texture() {
    let mut bytes = Vec::new();
    for px in [[255, 0, 0, 255], [0, 255, 0, 255], [0, 0, 255, 255], [0, 0, 0, 255]] {
        bytes.extend_from_slice(&px);
    }
    let base = Bitmap::from_premul_rgba8(2, 2, bytes).unwrap();
    let req = CompositeRequest::new("shirt").with_base(BaseTexture::new("quad", base));

    let c = compositor(4);
    let out = c.composite(&req, &MemoryImageLoader::new()).await.unwrap();
    assert_eq!(out.buffer.pixel(1, 1), Some([255, 0, 0, 255]));
    assert_eq!(out.buffer.pixel(2, 1), Some([0, 255, 0, 255]));
    assert_eq!(out.buffer.pixel(0, 3), Some([0, 0, 255, 255]));
    assert_eq!(out.buffer.pixel(3, 3), Some([0, 0, 0, 255]));
}

#[tokio::test]
async fn failing_base_falls_back_to_fill_with_warning() {
    let req = CompositeRequest::new("shirt")
        .with_base(BaseTexture::new("denim", ImageRef::url("denim.png")));
    let c = compositor(4);
    let out = c.composite(&req, &MemoryImageLoader::new()).await.unwrap();
    assert!(out.buffer.data().chunks_exact(4).all(|p| p == WHITE));
    assert_eq!(out.warnings.len(), 1);
    assert!(matches!(
        &out.warnings[0],
        CompositeWarning::Base { identity, failure: LayerFailure::Load(_) } if identity == "denim"
    ));
}

#[tokio::test]
async fn broken_layers_become_warnings() {
    let loader = MemoryImageLoader::new();
    loader.insert_bitmap("red.png", solid(2, 2, RED));
    let req = CompositeRequest::new("shirt")
        .with_layer(PrintLayer::image("ok", ImageRef::url("red.png")))
        .with_layer(PrintLayer::image("gone", ImageRef::url("gone.png")).with_z_index(1))
        .with_layer(PrintLayer::image("flat", ImageRef::url("red.png")).scaled(0.0))
        .with_layer(PrintLayer::text("t", text("Hi", "missing", TextColor::default())));

    let c = compositor(8);
    let out = c.composite(&req, &loader).await.unwrap();
    let ids: Vec<_> = out.warnings.iter().filter_map(|w| w.layer_id()).collect();
    assert_eq!(ids, vec!["flat", "t", "gone"]);
    assert!(matches!(out.warnings[0].failure(), LayerFailure::Invalid(_)));
    assert!(matches!(out.warnings[1].failure(), LayerFailure::Rasterize(_)));
    assert!(matches!(out.warnings[2].failure(), LayerFailure::Load(_)));
    assert_eq!(out.buffer.pixel(4, 4), Some(RED));
    assert_eq!(out.buffer.pixel(0, 0), Some(WHITE));
}

#[test]
fn compose_without_resolution_reports_missing_image() {
    let req = CompositeRequest::new("shirt")
        .with_layer(PrintLayer::image("p", ImageRef::url("red.png")));
    let out = compositor(4).compose(&req, &ResolvedImages::default()).unwrap();
    assert_eq!(out.warnings.len(), 1);
    assert!(matches!(out.warnings[0].failure(), LayerFailure::Load(_)));
}

#[tokio::test]
async fn text_layers_use_the_text_rasterizer() {
    let red = TextColor::rgba8(255, 0, 0, 255);
    let req =
        CompositeRequest::new("shirt").with_layer(PrintLayer::text("t", text("AB", "Any", red)));
    let c = compositor(16);
    let out = c.composite(&req, &MemoryImageLoader::new()).await.unwrap();
    assert!(out.warnings.is_empty());
    // Two characters at 4px: a 4x4 block centered on (8, 8).
    assert_eq!(out.buffer.pixel(6, 6), Some(RED));
    assert_eq!(out.buffer.pixel(9, 9), Some(RED));
    assert_eq!(out.buffer.pixel(5, 8), Some(WHITE));
    assert_eq!(out.buffer.pixel(10, 8), Some(WHITE));
}

#[tokio::test]
async fn blend_mode_applies_against_the_background() {
    let loader = MemoryImageLoader::new();
    loader.insert_bitmap("grey.png", solid(8, 8, [128, 128, 128, 255]));
    loader.insert_bitmap("red.png", solid(4, 4, RED));
    let req = CompositeRequest::new("shirt")
        .with_layer(PrintLayer::image("grey", ImageRef::url("grey.png")))
        .with_layer(
            PrintLayer::image("red", ImageRef::url("red.png"))
                .with_blend(BlendMode::Screen)
                .with_z_index(1),
        );
    let out = compositor(8).composite(&req, &loader).await.unwrap();
    assert_eq!(out.buffer.pixel(4, 4), Some([255, 128, 128, 255]));
    assert_eq!(out.buffer.pixel(0, 0), Some([128, 128, 128, 255]));
}

#[tokio::test]
async fn scratch_buffers_are_reused_across_composites() {
    let loader = MemoryImageLoader::new();
    loader.insert_bitmap("red.png", solid(4, 4, RED));
    let req = CompositeRequest::new("shirt")
        .with_layer(PrintLayer::image("a", ImageRef::url("red.png")))
        .with_layer(PrintLayer::image("b", ImageRef::url("red.png")).at(0.25, 0.25));
    let c = compositor(16);
    let first = c.composite(&req, &loader).await.unwrap();
    let second = c.composite(&req, &loader).await.unwrap();
    assert_eq!(first.buffer, second.buffer);
    let stats = c.scratch_stats();
    assert_eq!(stats.alloc_surfaces, 1);
    assert_eq!(stats.reused_surfaces, 3);
}
