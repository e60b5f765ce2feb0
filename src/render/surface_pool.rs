use std::collections::HashMap;

use crate::foundation::error::{PrintstackError, PrintstackResult};
use crate::render::raster::rgba8_byte_len;

/// Bounds for the scratch buffer pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ScratchPoolOpts {
    /// Maximum bytes retained across all buckets.
    pub max_pool_bytes: usize,
    /// Maximum number of retained buffers per `(width, height)` bucket.
    pub max_surfaces_per_bucket: usize,
}

impl Default for ScratchPoolOpts {
    fn default() -> Self {
        Self {
            max_pool_bytes: 64 * 1024 * 1024,
            max_surfaces_per_bucket: 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ScratchKey {
    w: u32,
    h: u32,
}

impl ScratchKey {
    fn byte_len(self) -> usize {
        (self.w as usize)
            .saturating_mul(self.h as usize)
            .saturating_mul(4)
    }
}

/// Pool counters.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScratchPoolStats {
    /// Buffers currently parked in the pool.
    pub retained_surfaces: usize,
    /// Bytes currently parked in the pool.
    pub retained_bytes: usize,
    /// Fresh allocations made by `borrow`.
    pub alloc_surfaces: u64,
    /// Bytes allocated by `borrow`.
    pub alloc_bytes: u64,
    /// Buffers handed back to the pool and reused.
    pub reused_surfaces: u64,
    /// Buffers dropped on release because a cap was hit.
    pub dropped_on_release: u64,
}

/// Bounded pool of transparent RGBA8 scratch buffers for layer patches.
///
/// Keyed by `(width, height)`. Borrow/release happen once per layer, never per pixel.
#[derive(Debug)]
pub(crate) struct ScratchPool {
    opts: ScratchPoolOpts,
    stats: ScratchPoolStats,
    buckets: HashMap<ScratchKey, Vec<Vec<u8>>>,
}

impl ScratchPool {
    pub(crate) fn new(opts: ScratchPoolOpts) -> Self {
        Self {
            opts,
            stats: ScratchPoolStats::default(),
            buckets: HashMap::new(),
        }
    }

    pub(crate) fn stats(&self) -> ScratchPoolStats {
        self.stats.clone()
    }

    /// Hand out a zeroed `w x h` RGBA8 buffer.
    pub(crate) fn borrow(&mut self, w: u32, h: u32) -> PrintstackResult<Vec<u8>> {
        let key = ScratchKey { w, h };
        if let Some(mut buf) = self.buckets.get_mut(&key).and_then(Vec::pop) {
            self.stats.retained_surfaces = self.stats.retained_surfaces.saturating_sub(1);
            self.stats.retained_bytes = self.stats.retained_bytes.saturating_sub(key.byte_len());
            self.stats.reused_surfaces = self.stats.reused_surfaces.saturating_add(1);
            buf.fill(0);
            return Ok(buf);
        }

        let len = rgba8_byte_len(w, h)?;
        let mut buf = Vec::new();
        buf.try_reserve_exact(len).map_err(|e| {
            PrintstackError::allocation(format!("cannot allocate {w}x{h} scratch buffer: {e}"))
        })?;
        buf.resize(len, 0);
        self.stats.alloc_surfaces = self.stats.alloc_surfaces.saturating_add(1);
        self.stats.alloc_bytes = self.stats.alloc_bytes.saturating_add(len as u64);
        Ok(buf)
    }

    /// Return a buffer previously obtained from [`ScratchPool::borrow`] with the same size.
    pub(crate) fn release(&mut self, w: u32, h: u32, buf: Vec<u8>) {
        let key = ScratchKey { w, h };
        let bytes = key.byte_len();
        if self.opts.max_pool_bytes == 0
            || self.opts.max_surfaces_per_bucket == 0
            || buf.len() != bytes
            || self.stats.retained_bytes.saturating_add(bytes) > self.opts.max_pool_bytes
        {
            self.stats.dropped_on_release = self.stats.dropped_on_release.saturating_add(1);
            return;
        }

        let bucket = self.buckets.entry(key).or_default();
        if bucket.len() >= self.opts.max_surfaces_per_bucket {
            self.stats.dropped_on_release = self.stats.dropped_on_release.saturating_add(1);
            return;
        }

        bucket.push(buf);
        self.stats.retained_surfaces = self.stats.retained_surfaces.saturating_add(1);
        self.stats.retained_bytes = self.stats.retained_bytes.saturating_add(bytes);
    }
}
