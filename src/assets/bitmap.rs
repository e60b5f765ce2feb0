use std::sync::Arc;

use xxhash_rust::xxh3::Xxh3;

use crate::foundation::core::Rgba8Premul;
use crate::foundation::error::{PrintstackError, PrintstackResult};
use crate::foundation::math::premultiply_rgba8_in_place;
use crate::render::raster::rgba8_byte_len;

const CONTENT_ID_SEED: u64 = 0x51c3_77e0_b1d4_2a09;

/// Decoded raster image in premultiplied RGBA8 form.
///
/// Cloning is cheap; pixels are shared. The content id is a digest of dimensions and pixels and
/// identifies the bitmap inside composite fingerprints.
#[derive(Clone)]
pub struct Bitmap {
    width: u32,
    height: u32,
    rgba8_premul: Arc<Vec<u8>>,
    content_id: u128,
}

impl std::fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bitmap")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("content_id", &format_args!("{:032x}", self.content_id))
            .finish()
    }
}

impl PartialEq for Bitmap {
    fn eq(&self, other: &Self) -> bool {
        self.width == other.width
            && self.height == other.height
            && self.rgba8_premul == other.rgba8_premul
    }
}

impl Eq for Bitmap {}

impl Bitmap {
    /// Wrap premultiplied RGBA8 bytes.
    pub fn from_premul_rgba8(width: u32, height: u32, bytes: Vec<u8>) -> PrintstackResult<Self> {
        if width == 0 || height == 0 {
            return Err(PrintstackError::validation("bitmap must be non-empty"));
        }
        let len = rgba8_byte_len(width, height)?;
        if bytes.len() != len {
            return Err(PrintstackError::validation(format!(
                "bitmap byte len mismatch: got {}, expected {len}",
                bytes.len()
            )));
        }
        let content_id = content_id(width, height, &bytes);
        Ok(Self {
            width,
            height,
            rgba8_premul: Arc::new(bytes),
            content_id,
        })
    }

    /// Wrap straight-alpha RGBA8 bytes, premultiplying them.
    pub fn from_straight_rgba8(
        width: u32,
        height: u32,
        mut bytes: Vec<u8>,
    ) -> PrintstackResult<Self> {
        premultiply_rgba8_in_place(&mut bytes);
        Self::from_premul_rgba8(width, height, bytes)
    }

    /// Convert an `image` crate buffer (straight alpha).
    pub fn from_rgba_image(img: image::RgbaImage) -> PrintstackResult<Self> {
        let (width, height) = img.dimensions();
        Self::from_straight_rgba8(width, height, img.into_raw())
    }

    /// A solid-color bitmap.
    pub fn solid(width: u32, height: u32, color: Rgba8Premul) -> PrintstackResult<Self> {
        let len = rgba8_byte_len(width, height)?;
        let px = color.to_array();
        let mut bytes = Vec::with_capacity(len);
        for _ in 0..(len / 4) {
            bytes.extend_from_slice(&px);
        }
        Self::from_premul_rgba8(width, height, bytes)
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Premultiplied RGBA8 bytes.
    pub fn pixels(&self) -> &[u8] {
        &self.rgba8_premul
    }

    /// Digest of dimensions and pixels.
    pub fn content_id(&self) -> u128 {
        self.content_id
    }

    /// Pixel at `(x, y)`; out-of-range coordinates read as transparent.
    pub(crate) fn sample(&self, x: i64, y: i64) -> [u8; 4] {
        if x < 0 || y < 0 || x >= i64::from(self.width) || y >= i64::from(self.height) {
            return [0, 0, 0, 0];
        }
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        let p = &self.rgba8_premul;
        [p[idx], p[idx + 1], p[idx + 2], p[idx + 3]]
    }
}

fn content_id(width: u32, height: u32, bytes: &[u8]) -> u128 {
    let mut hasher = Xxh3::with_seed(CONTENT_ID_SEED);
    hasher.update(&width.to_le_bytes());
    hasher.update(&height.to_le_bytes());
    hasher.update(bytes);
    hasher.digest128()
}

/// Where an image layer's pixels come from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImageRef {
    /// URL or path, resolved through an [`crate::ImageLoader`].
    Url(String),
    /// Already-decoded pixels supplied by the host.
    Bitmap(Arc<Bitmap>),
}

impl ImageRef {
    /// Reference a URL or path.
    pub fn url(s: impl Into<String>) -> Self {
        Self::Url(s.into())
    }

    /// Reference decoded pixels.
    pub fn bitmap(b: Bitmap) -> Self {
        Self::Bitmap(Arc::new(b))
    }
}

impl From<Bitmap> for ImageRef {
    fn from(b: Bitmap) -> Self {
        Self::bitmap(b)
    }
}

impl serde::Serialize for ImageRef {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Self::Url(u) => serializer.serialize_str(u),
            Self::Bitmap(_) => Err(serde::ser::Error::custom(
                "decoded bitmap references cannot be serialized",
            )),
        }
    }
}

impl<'de> serde::Deserialize<'de> for ImageRef {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        if s.trim().is_empty() {
            return Err(serde::de::Error::custom("image reference must be non-empty"));
        }
        Ok(Self::Url(s))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/bitmap.rs"]
mod tests;
