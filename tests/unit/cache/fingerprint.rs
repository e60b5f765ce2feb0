use super::*;
use crate::assets::bitmap::Bitmap;
use crate::assets::color::TextColor;
use crate::effects::blend::BlendMode;
use crate::foundation::core::Rgba8Premul;
use crate::scene::layer::{TextAlign, TextLayer};

fn cfg() -> EngineConfig {
    EngineConfig::default()
}

fn print(id: &str) -> PrintLayer {
    PrintLayer::image(id, ImageRef::url(format!("{id}.png")))
}

fn base_request() -> CompositeRequest {
    CompositeRequest::new("front")
        .with_base(BaseTexture::new("cotton", ImageRef::url("cotton.png")))
        .with_layer(print("a").at(0.3, 0.4).with_z_index(1))
        .with_layer(print("b").with_blend(BlendMode::Multiply))
}

fn key(req: &CompositeRequest) -> CompositeKey {
    CompositeKey::for_request(req, &cfg())
}

#[test]
fn identical_requests_share_a_key() {
    let a = key(&base_request());
    let b = key(&base_request());
    assert_eq!(a, b);
    assert_eq!(a.digest_hex(), b.digest_hex());
    assert_eq!(a.digest_hex().len(), 32);
}

#[test]
fn component_id_is_not_part_of_the_key() {
    let mut other = base_request();
    other.component_id = "back".to_owned();
    assert_eq!(key(&base_request()), key(&other));
}

#[test]
fn every_pixel_affecting_field_changes_the_key() {
    let base = key(&base_request());
    let variants: Vec<Box<dyn Fn(&mut CompositeRequest)>> = vec![
        Box::new(|r: &mut CompositeRequest| r.base.identity = "denim".to_owned()),
        Box::new(|r: &mut CompositeRequest| r.base.source = Some(ImageRef::url("cotton2.png"))),
        Box::new(|r: &mut CompositeRequest| r.layers[0].id = "a2".to_owned()),
        Box::new(|r: &mut CompositeRequest| r.layers[0].position.u = 0.31),
        Box::new(|r: &mut CompositeRequest| r.layers[0].position.v = 0.41),
        Box::new(|r: &mut CompositeRequest| r.layers[0].scale = 1.5),
        Box::new(|r: &mut CompositeRequest| r.layers[0].rotation_degrees = 10.0),
        Box::new(|r: &mut CompositeRequest| r.layers[0].opacity = 0.5),
        Box::new(|r: &mut CompositeRequest| r.layers[0].blend_mode = BlendMode::Screen),
        Box::new(|r: &mut CompositeRequest| r.layers[0].z_index = 2),
        Box::new(|r: &mut CompositeRequest| r.layers[1].kind = print("c").kind),
        Box::new(|r: &mut CompositeRequest| {
            if let LayerKind::Image(img) = &mut r.layers[1].kind {
                img.width = Some(10);
            }
        }),
        Box::new(|r: &mut CompositeRequest| r.layers.push(print("d"))),
        Box::new(|r: &mut CompositeRequest| {
            r.layers.pop();
        }),
    ];
    for (i, mutate) in variants.iter().enumerate() {
        let mut req = base_request();
        mutate(&mut req);
        assert_ne!(key(&req), base, "variant {i} did not change the key");
    }
}

#[test]
fn config_that_changes_pixels_changes_the_key() {
    let req = base_request();
    let a = CompositeKey::for_request(&req, &cfg());
    let b = CompositeKey::for_request(
        &req,
        &EngineConfig {
            texture_size: 1024,
            ..cfg()
        },
    );
    let c = CompositeKey::for_request(
        &req,
        &EngineConfig {
            max_print_fraction: 0.5,
            ..cfg()
        },
    );
    assert_ne!(a, b);
    assert_ne!(a, c);
    // Cache policy does not touch pixels.
    let d = CompositeKey::for_request(
        &req,
        &EngineConfig {
            max_cache_entries: 3,
            ..cfg()
        },
    );
    assert_eq!(a, d);
}

#[test]
fn string_boundaries_cannot_collide() {
    let one = CompositeRequest::new("x")
        .with_layer(PrintLayer::image("ab", ImageRef::url("c")));
    let two = CompositeRequest::new("x")
        .with_layer(PrintLayer::image("a", ImageRef::url("bc")));
    assert_ne!(key(&one), key(&two));
}

#[test]
fn tie_order_is_part_of_the_key() {
    let ab = CompositeRequest::new("x")
        .with_layer(print("a"))
        .with_layer(print("b"));
    let ba = CompositeRequest::new("x")
        .with_layer(print("b"))
        .with_layer(print("a"));
    assert_ne!(key(&ab), key(&ba));
}

#[test]
fn equivalent_rotations_and_opacities_share_a_key() {
    let a = CompositeRequest::new("x").with_layer(print("a").rotated(0.0).with_opacity(1.0));
    let b = CompositeRequest::new("x").with_layer(print("a").rotated(360.0).with_opacity(3.0));
    let c = CompositeRequest::new("x").with_layer(print("a").rotated(-0.0));
    assert_eq!(key(&a), key(&b));
    assert_eq!(key(&a), key(&c));
}

#[test]
fn bitmaps_are_keyed_by_content() {
    let red = Rgba8Premul::from_straight_rgba(255, 0, 0, 255);
    let mk = |color| {
        CompositeRequest::new("x").with_layer(PrintLayer::image(
            "p",
            Bitmap::solid(2, 2, color).unwrap(),
        ))
    };
    assert_eq!(key(&mk(red)), key(&mk(red)));
    assert_ne!(key(&mk(red)), key(&mk(Rgba8Premul::white())));
}

#[test]
fn text_fields_are_keyed() {
    let t = TextLayer {
        content: "Team".to_owned(),
        font_family: "Inter".to_owned(),
        font_size_px: 32.0,
        font_weight: 400,
        color: TextColor::default(),
        text_align: TextAlign::Center,
    };
    let mk = |t: TextLayer| CompositeRequest::new("x").with_layer(PrintLayer::text("t", t));
    let base = key(&mk(t.clone()));

    assert_eq!(
        base,
        key(&mk(TextLayer {
            font_family: "inter".to_owned(),
            ..t.clone()
        }))
    );
    for changed in [
        TextLayer { content: "Tean".to_owned(), ..t.clone() },
        TextLayer { font_size_px: 33.0, ..t.clone() },
        TextLayer { font_weight: 700, ..t.clone() },
        TextLayer { color: TextColor::rgba8(1, 0, 0, 255), ..t.clone() },
        TextLayer { text_align: TextAlign::Left, ..t.clone() },
    ] {
        assert_ne!(key(&mk(changed)), base);
    }
}
