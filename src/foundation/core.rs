pub use kurbo::{Affine, Point, Rect};

/// Normalized texture-space coordinate in `[0, 1] x [0, 1]`, `v` pointing down.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize)]
pub struct Uv {
    /// Horizontal coordinate.
    pub u: f64,
    /// Vertical coordinate.
    pub v: f64,
}

impl Uv {
    /// Create a UV coordinate.
    pub fn new(u: f64, v: f64) -> Self {
        Self { u, v }
    }

    /// The texture center `(0.5, 0.5)`.
    pub fn center() -> Self {
        Self::new(0.5, 0.5)
    }

    /// Return `true` when both components are finite.
    pub fn is_finite(self) -> bool {
        self.u.is_finite() && self.v.is_finite()
    }

    /// Map into pixel space for a square texture of side `size`.
    pub fn to_pixels(self, size: u32) -> Point {
        let s = f64::from(size);
        Point::new(self.u * s, self.v * s)
    }
}

impl<'de> serde::Deserialize<'de> for Uv {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(serde::Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Arr([f64; 2]),
            Obj { u: f64, v: f64 },
        }

        match Repr::deserialize(deserializer)? {
            Repr::Arr([u, v]) => Ok(Self { u, v }),
            Repr::Obj { u, v } => Ok(Self { u, v }),
        }
    }
}

/// Premultiplied RGBA8 (r,g,b already multiplied by a).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Rgba8Premul {
    /// Red channel premultiplied by alpha.
    pub r: u8,
    /// Green channel premultiplied by alpha.
    pub g: u8,
    /// Blue channel premultiplied by alpha.
    pub b: u8,
    /// Alpha channel.
    pub a: u8,
}

impl Rgba8Premul {
    /// Fully transparent black.
    pub fn transparent() -> Self {
        Self {
            r: 0,
            g: 0,
            b: 0,
            a: 0,
        }
    }

    /// Opaque white, the neutral base fill.
    pub fn white() -> Self {
        Self {
            r: 255,
            g: 255,
            b: 255,
            a: 255,
        }
    }

    /// Convert straight-alpha RGBA8 into premultiplied RGBA8.
    pub fn from_straight_rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        fn premul(c: u8, a: u8) -> u8 {
            let c = u16::from(c);
            let a = u16::from(a);
            (((c * a) + 127) / 255) as u8
        }

        Self {
            r: premul(r, a),
            g: premul(g, a),
            b: premul(b, a),
            a,
        }
    }

    /// Pixel bytes in `[r, g, b, a]` order.
    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
