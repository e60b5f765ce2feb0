use super::*;

#[test]
fn uv_maps_to_pixel_space() {
    let p = Uv::new(0.25, 0.75).to_pixels(64);
    assert_eq!(p, Point::new(16.0, 48.0));
    assert_eq!(Uv::center().to_pixels(2048), Point::new(1024.0, 1024.0));
}

#[test]
fn uv_finiteness() {
    assert!(Uv::new(0.0, 1.0).is_finite());
    assert!(!Uv::new(f64::NAN, 0.5).is_finite());
    assert!(!Uv::new(0.5, f64::INFINITY).is_finite());
}

#[test]
fn premultiply_rounds_to_nearest() {
    let c = Rgba8Premul::from_straight_rgba(255, 100, 0, 128);
    assert_eq!(c.to_array(), [128, 50, 0, 128]);
    assert_eq!(Rgba8Premul::from_straight_rgba(9, 9, 9, 0), Rgba8Premul::transparent());
    assert_eq!(
        Rgba8Premul::from_straight_rgba(255, 255, 255, 255),
        Rgba8Premul::white()
    );
}

#[test]
fn uv_deserializes_from_array_or_object() {
    let a: Uv = serde_json::from_str("[0.25, 0.5]").unwrap();
    let b: Uv = serde_json::from_str(r#"{"u": 0.25, "v": 0.5}"#).unwrap();
    assert_eq!(a, b);
    assert!(serde_json::from_str::<Uv>("[1.0]").is_err());
}
