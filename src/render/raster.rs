use crate::foundation::core::Rgba8Premul;
use crate::foundation::error::{PrintstackError, PrintstackResult};

/// Width x height grid of premultiplied RGBA8 pixels, tightly packed, row-major.
///
/// A buffer has exactly one owner at a time: the compositor while it accumulates, then the
/// [`crate::TextureHandle`] that wraps it. Nothing mutates a buffer after it has been wrapped.
#[derive(Clone, PartialEq, Eq)]
pub struct RasterBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl std::fmt::Debug for RasterBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RasterBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

pub(crate) fn rgba8_byte_len(width: u32, height: u32) -> PrintstackResult<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(4))
        .ok_or_else(|| {
            PrintstackError::allocation(format!("raster size overflow: {width}x{height}"))
        })
}

impl RasterBuffer {
    /// Allocate a transparent buffer.
    ///
    /// Fails with [`PrintstackError::Allocation`] for empty sizes, size overflow, or when the
    /// allocator refuses the reservation.
    pub fn new(width: u32, height: u32) -> PrintstackResult<Self> {
        Self::filled(width, height, Rgba8Premul::transparent())
    }

    /// Allocate a buffer filled with `color`.
    pub fn filled(width: u32, height: u32, color: Rgba8Premul) -> PrintstackResult<Self> {
        if width == 0 || height == 0 {
            return Err(PrintstackError::allocation(format!(
                "raster size must be non-empty, got {width}x{height}"
            )));
        }
        let len = rgba8_byte_len(width, height)?;
        let mut data = Vec::new();
        data.try_reserve_exact(len).map_err(|e| {
            PrintstackError::allocation(format!("cannot allocate {width}x{height} raster: {e}"))
        })?;
        let px = color.to_array();
        for _ in 0..(len / 4) {
            data.extend_from_slice(&px);
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Wrap existing premultiplied bytes.
    pub fn from_premul_bytes(width: u32, height: u32, data: Vec<u8>) -> PrintstackResult<Self> {
        let len = rgba8_byte_len(width, height)?;
        if data.len() != len {
            return Err(PrintstackError::validation(format!(
                "raster byte len mismatch: got {}, expected {len}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bytes per row.
    pub fn row_stride(&self) -> usize {
        self.width as usize * 4
    }

    /// Premultiplied RGBA8 bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Consume the buffer and return its bytes.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Pixel at `(x, y)`, or `None` outside the buffer.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        Some([
            self.data[idx],
            self.data[idx + 1],
            self.data[idx + 2],
            self.data[idx + 3],
        ])
    }
}

/// One layer rasterized into its own scratch buffer, already transformed and with the layer
/// opacity folded into its (premultiplied) pixels.
///
/// `(x, y)` is the top-left corner of the patch footprint inside the texture; the footprint is
/// always clipped to the texture bounds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LayerPatch {
    /// Left edge in texture pixels.
    pub x: u32,
    /// Top edge in texture pixels.
    pub y: u32,
    /// Footprint width in pixels.
    pub width: u32,
    /// Footprint height in pixels.
    pub height: u32,
    /// Premultiplied RGBA8 bytes for the footprint.
    pub pixels: Vec<u8>,
}

impl LayerPatch {
    /// Pixel at patch-local `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        Some([
            self.pixels[idx],
            self.pixels[idx + 1],
            self.pixels[idx + 2],
            self.pixels[idx + 3],
        ])
    }
}
