use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::foundation::error::{PrintstackError, PrintstackResult};
use crate::foundation::math::unpremultiply_rgba8_in_place;
use crate::render::raster::RasterBuffer;

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

/// Renderer-facing wrapper around a finished composite.
///
/// The handle exclusively owns its buffer until [`TextureHandle::dispose`] releases it.
/// Disposal is idempotent; pixel access afterwards fails with [`PrintstackError::Disposed`].
pub struct TextureHandle {
    id: u64,
    width: u32,
    height: u32,
    buffer: Mutex<Option<RasterBuffer>>,
}

impl std::fmt::Debug for TextureHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextureHandle")
            .field("id", &self.id)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl TextureHandle {
    /// Wrap a finished buffer.
    pub fn new(buffer: RasterBuffer) -> Self {
        Self {
            id: NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed),
            width: buffer.width(),
            height: buffer.height(),
            buffer: Mutex::new(Some(buffer)),
        }
    }

    /// Process-unique handle id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Release the pixels. Returns `true` on the call that actually released them.
    pub fn dispose(&self) -> bool {
        let released = self
            .buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some();
        if released {
            tracing::debug!(handle = self.id, "texture disposed");
        }
        released
    }

    /// `true` once the pixels have been released.
    pub fn is_disposed(&self) -> bool {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Run `f` with the premultiplied RGBA8 buffer.
    pub fn with_pixels<R>(&self, f: impl FnOnce(&RasterBuffer) -> R) -> PrintstackResult<R> {
        let guard = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        guard
            .as_ref()
            .map(f)
            .ok_or(PrintstackError::Disposed(self.id))
    }

    /// Copy of the premultiplied pixels.
    pub fn to_raster(&self) -> PrintstackResult<RasterBuffer> {
        self.with_pixels(RasterBuffer::clone)
    }

    /// Straight-alpha copy for upload or PNG export.
    pub fn to_rgba_image(&self) -> PrintstackResult<image::RgbaImage> {
        let mut bytes = self.with_pixels(|b| b.data().to_vec())?;
        unpremultiply_rgba8_in_place(&mut bytes);
        image::RgbaImage::from_raw(self.width, self.height, bytes).ok_or_else(|| {
            PrintstackError::validation("texture byte length does not match its dimensions")
        })
    }
}
