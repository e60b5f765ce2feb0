use super::*;
use crate::assets::bitmap::ImageRef;
use crate::foundation::core::Rgba8Premul;
use crate::scene::layer::LayerKind;

const RED: [u8; 4] = [255, 0, 0, 255];
const BLUE: [u8; 4] = [0, 0, 255, 255];

fn solid(w: u32, h: u32, px: [u8; 4]) -> Arc<Bitmap> {
    let color = Rgba8Premul::from_straight_rgba(px[0], px[1], px[2], px[3]);
    Arc::new(Bitmap::solid(w, h, color).unwrap())
}

/// `w x h` bitmap whose left half is red and right half blue.
fn split(w: u32, h: u32) -> Arc<Bitmap> {
    let mut bytes = Vec::new();
    for _ in 0..h {
        for x in 0..w {
            bytes.extend_from_slice(if x < w / 2 { &RED } else { &BLUE });
        }
    }
    Arc::new(Bitmap::from_premul_rgba8(w, h, bytes).unwrap())
}

fn image_layer(bitmap: &Arc<Bitmap>) -> (PrintLayer, ImageLayer) {
    let layer = PrintLayer::image("p", ImageRef::Bitmap(Arc::clone(bitmap)));
    let LayerKind::Image(img) = layer.kind.clone() else {
        unreachable!()
    };
    (layer, img)
}

fn opaque_count(patch: &LayerPatch) -> usize {
    patch.pixels.chunks_exact(4).filter(|p| p[3] > 0).count()
}

#[test]
fn centered_image_lands_on_its_footprint() {
    let bmp = solid(4, 2, RED);
    let (layer, img) = image_layer(&bmp);
    let placed = PlacedSource::for_image(Arc::clone(&bmp), &img, 1.0, 1e9);
    let patch = rasterize_layer(&layer, &placed, 16).unwrap().unwrap();
    assert_eq!((patch.x, patch.y, patch.width, patch.height), (6, 7, 4, 2));
    assert!(patch.pixels.chunks_exact(4).all(|p| p == RED));
}

#[test]
fn width_is_capped_and_aspect_kept() {
    let bmp = solid(20, 10, RED);
    let (layer, img) = image_layer(&bmp);
    let placed = PlacedSource::for_image(Arc::clone(&bmp), &img, 2.0, 8.0);
    assert_eq!(placed.draw_width, 8.0);
    assert_eq!(placed.draw_height, 4.0);

    let patch = rasterize_layer(&layer.at(0.5, 0.5), &placed, 32).unwrap().unwrap();
    assert_eq!((patch.width, patch.height), (8, 4));
    assert_eq!(opaque_count(&patch), 32);
}

#[test]
fn declared_size_overrides_natural_size() {
    let bmp = solid(10, 10, RED);
    let (_, mut img) = image_layer(&bmp);
    img.width = Some(4);
    let placed = PlacedSource::for_image(Arc::clone(&bmp), &img, 1.0, 1e9);
    assert_eq!((placed.draw_width, placed.draw_height), (4.0, 4.0));

    img.height = Some(2);
    let placed = PlacedSource::for_image(bmp, &img, 1.5, 1e9);
    assert_eq!((placed.draw_width, placed.draw_height), (6.0, 3.0));
}

#[test]
fn rotation_is_clockwise_about_the_anchor() {
    let bmp = split(4, 2);
    let (layer, img) = image_layer(&bmp);
    let placed = PlacedSource::for_image(Arc::clone(&bmp), &img, 1.0, 1e9);
    let patch = rasterize_layer(&layer.rotated(90.0), &placed, 16)
        .unwrap()
        .unwrap();
    assert_eq!(opaque_count(&patch), 8);

    let at = |x: u32, y: u32| patch.pixel(x - patch.x, y - patch.y).unwrap();
    // The left (red) half swings to the top.
    assert_eq!(at(7, 6), RED);
    assert_eq!(at(8, 7), RED);
    assert_eq!(at(7, 8), BLUE);
    assert_eq!(at(8, 9), BLUE);
}

#[test]
fn opacity_scales_premultiplied_pixels() {
    let bmp = solid(2, 2, RED);
    let (layer, img) = image_layer(&bmp);
    let placed = PlacedSource::for_image(Arc::clone(&bmp), &img, 1.0, 1e9);
    let patch = rasterize_layer(&layer.clone().with_opacity(0.5), &placed, 8)
        .unwrap()
        .unwrap();
    assert!(patch.pixels.chunks_exact(4).all(|p| p == [128, 0, 0, 128]));

    assert!(rasterize_layer(&layer.with_opacity(0.0), &placed, 8)
        .unwrap()
        .is_none());
}

#[test]
fn footprint_is_clipped_to_the_texture() {
    let bmp = solid(4, 4, RED);
    let (layer, img) = image_layer(&bmp);
    let placed = PlacedSource::for_image(Arc::clone(&bmp), &img, 1.0, 1e9);

    let patch = rasterize_layer(&layer.clone().at(0.0, 0.0), &placed, 16)
        .unwrap()
        .unwrap();
    assert_eq!((patch.x, patch.y, patch.width, patch.height), (0, 0, 2, 2));
    assert_eq!(opaque_count(&patch), 4);

    assert!(rasterize_layer(&layer.at(3.0, 3.0), &placed, 16)
        .unwrap()
        .is_none());
}

#[test]
fn text_pivot_follows_alignment() {
    let bmp = solid(6, 2, BLUE);
    let layer = PrintLayer::image("t", ImageRef::Bitmap(Arc::clone(&bmp)));

    let left = PlacedSource::for_text(Arc::clone(&bmp), TextAlign::Left);
    let patch = rasterize_layer(&layer, &left, 16).unwrap().unwrap();
    assert_eq!((patch.x, patch.y, patch.width), (8, 7, 6));

    let right = PlacedSource::for_text(Arc::clone(&bmp), TextAlign::Right);
    let patch = rasterize_layer(&layer, &right, 16).unwrap().unwrap();
    assert_eq!((patch.x, patch.width), (2, 6));

    let center = PlacedSource::for_text(bmp, TextAlign::Center);
    let patch = rasterize_layer(&layer, &center, 16).unwrap().unwrap();
    assert_eq!((patch.x, patch.width), (5, 6));
}

#[test]
fn paint_rejects_mismatched_scratch() {
    let bmp = solid(2, 2, RED);
    let (layer, img) = image_layer(&bmp);
    let placed = PlacedSource::for_image(Arc::clone(&bmp), &img, 1.0, 1e9);
    let plan = plan_patch(&layer, &placed, 8).unwrap();
    assert!(paint_patch(&plan, &placed, vec![0; 3]).is_err());
}
