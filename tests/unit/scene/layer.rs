use serde_json::json;

use super::*;

#[test]
fn defaults_fill_in_missing_fields() {
    let layer: PrintLayer = serde_json::from_value(json!({
        "id": "logo",
        "kind": { "image": { "image_ref": "prints/logo.png" } }
    }))
    .unwrap();
    assert_eq!(layer.position, Uv::center());
    assert_eq!(layer.scale, 1.0);
    assert_eq!(layer.opacity, 1.0);
    assert_eq!(layer.blend_mode, BlendMode::Normal);
    assert_eq!(layer.z_index, 0);
    assert_eq!(layer.image_ref(), Some(&ImageRef::url("prints/logo.png")));
}

#[test]
fn camel_case_aliases_and_unknown_blend() {
    let layer: PrintLayer = serde_json::from_value(json!({
        "id": "t",
        "position": [0.25, 0.75],
        "rotationDegrees": 45.0,
        "blendMode": "vivid-light",
        "zIndex": 3,
        "kind": { "text": {
            "content": "Hi",
            "fontFamily": "Inter",
            "fontSizePx": 18.0,
            "textAlign": "right",
            "color": "#ff0000"
        } }
    }))
    .unwrap();
    assert_eq!(layer.position, Uv::new(0.25, 0.75));
    assert_eq!(layer.rotation_degrees, 45.0);
    assert_eq!(layer.blend_mode, BlendMode::Normal);
    assert_eq!(layer.z_index, 3);
    let LayerKind::Text(text) = &layer.kind else {
        panic!("expected text layer");
    };
    assert_eq!(text.font_weight, 400);
    assert_eq!(text.text_align, TextAlign::Right);
    assert_eq!(text.color, TextColor::rgba8(255, 0, 0, 255));
}

#[test]
fn rotation_is_folded_into_one_turn() {
    let l = PrintLayer::image("a", ImageRef::url("x.png"));
    assert_eq!(l.clone().rotated(-90.0).normalized_rotation(), 270.0);
    assert_eq!(l.clone().rotated(720.0).normalized_rotation(), 0.0);
    assert_eq!(l.clone().rotated(365.5).normalized_rotation(), 5.5);
    assert_eq!(l.clone().rotated(f64::NAN).normalized_rotation(), 0.0);
    assert_eq!(l.rotated(f64::INFINITY).normalized_rotation(), 0.0);
}

#[test]
fn opacity_is_clamped() {
    let l = PrintLayer::image("a", ImageRef::url("x.png"));
    assert_eq!(l.clone().with_opacity(1.7).clamped_opacity(), 1.0);
    assert_eq!(l.with_opacity(-0.2).clamped_opacity(), 0.0);
}

#[test]
fn validate_rejects_undrawable_layers() {
    let ok = PrintLayer::image("a", ImageRef::url("x.png"));
    assert!(ok.validate().is_ok());
    assert!(ok.clone().scaled(0.0).validate().is_err());
    assert!(ok.clone().scaled(-1.0).validate().is_err());
    assert!(ok.clone().at(f64::NAN, 0.5).validate().is_err());
    assert!(ok.clone().with_opacity(f64::NAN).validate().is_err());

    let mut declared = ok;
    if let LayerKind::Image(img) = &mut declared.kind {
        img.width = Some(0);
    }
    assert!(declared.validate().is_err());
}

#[test]
fn text_anchor_follows_alignment() {
    assert_eq!(TextAlign::Left.anchor_x(40.0), 0.0);
    assert_eq!(TextAlign::Center.anchor_x(40.0), 20.0);
    assert_eq!(TextAlign::Right.anchor_x(40.0), 40.0);
}
