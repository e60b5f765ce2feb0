use std::path::Path;
use std::time::Duration;

use anyhow::Context as _;

use crate::foundation::core::Rgba8Premul;
use crate::foundation::error::{PrintstackError, PrintstackResult};
use crate::render::surface_pool::ScratchPoolOpts;

/// Largest accepted texture side. Larger buffers are rejected up front instead of failing deep
/// inside an allocation.
pub const MAX_TEXTURE_SIZE: u32 = 16_384;

/// Engine-wide settings shared by the compositor and the composite cache.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Side length of the square accumulation buffer, in pixels.
    pub texture_size: u32,
    /// Cap on an image print's width as a fraction of `texture_size`.
    ///
    /// Tunable heuristic; keeps a single oversized upload from swallowing the garment.
    pub max_print_fraction: f32,
    /// Per-image resolution timeout.
    pub image_timeout_ms: u64,
    /// Entries unused for longer than this are dropped by background eviction.
    pub cache_max_age_ms: u64,
    /// Period of the background eviction task.
    pub eviction_interval_ms: u64,
    /// Upper bound on cached composites; least recently used entries go first.
    pub max_cache_entries: usize,
    /// Fill used when the request has no base texture pixels.
    pub base_fill_rgba: Rgba8Premul,
    /// Scratch buffer pool bounds.
    pub scratch_pool: ScratchPoolOpts,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            texture_size: 2048,
            max_print_fraction: 0.3,
            image_timeout_ms: 10_000,
            cache_max_age_ms: 5 * 60 * 1000,
            eviction_interval_ms: 30_000,
            max_cache_entries: 32,
            base_fill_rgba: Rgba8Premul::white(),
            scratch_pool: ScratchPoolOpts::default(),
        }
    }
}

impl EngineConfig {
    /// Load a JSON config file. Missing fields take their defaults.
    pub fn from_json_path(path: &Path) -> PrintstackResult<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("read engine config '{}'", path.display()))?;
        let cfg: Self = serde_json::from_slice(&bytes)
            .map_err(|e| PrintstackError::serde(format!("engine config json: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Apply `PRINTSTACK_*` environment overrides.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable lookup. Unparseable values are ignored.
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        fn parsed<T: std::str::FromStr>(
            lookup: &impl Fn(&str) -> Option<String>,
            name: &str,
        ) -> Option<T> {
            lookup(name).and_then(|v| v.trim().parse::<T>().ok())
        }

        if let Some(v) = parsed::<u32>(&lookup, "PRINTSTACK_TEXTURE_SIZE").filter(|&v| v > 0) {
            self.texture_size = v;
        }
        if let Some(v) = parsed::<u64>(&lookup, "PRINTSTACK_IMAGE_TIMEOUT_MS") {
            self.image_timeout_ms = v;
        }
        if let Some(v) = parsed::<u64>(&lookup, "PRINTSTACK_CACHE_MAX_AGE_MS") {
            self.cache_max_age_ms = v;
        }
        if let Some(v) = parsed::<usize>(&lookup, "PRINTSTACK_MAX_CACHE_ENTRIES").filter(|&v| v > 0)
        {
            self.max_cache_entries = v;
        }
        self
    }

    /// Reject settings the engine cannot honour.
    pub fn validate(&self) -> PrintstackResult<()> {
        if self.texture_size == 0 || self.texture_size > MAX_TEXTURE_SIZE {
            return Err(PrintstackError::validation(format!(
                "texture_size must be in 1..={MAX_TEXTURE_SIZE}, got {}",
                self.texture_size
            )));
        }
        if !self.max_print_fraction.is_finite() || self.max_print_fraction <= 0.0 {
            return Err(PrintstackError::validation(
                "max_print_fraction must be finite and > 0",
            ));
        }
        if self.max_cache_entries == 0 {
            return Err(PrintstackError::validation("max_cache_entries must be > 0"));
        }
        if self.eviction_interval_ms == 0 {
            return Err(PrintstackError::validation(
                "eviction_interval_ms must be > 0",
            ));
        }
        Ok(())
    }

    /// Per-image resolution timeout.
    pub fn image_timeout(&self) -> Duration {
        Duration::from_millis(self.image_timeout_ms)
    }

    /// Maximum idle age before an entry is evicted.
    pub fn cache_max_age(&self) -> Duration {
        Duration::from_millis(self.cache_max_age_ms)
    }

    /// Background eviction period.
    pub fn eviction_interval(&self) -> Duration {
        Duration::from_millis(self.eviction_interval_ms)
    }

    /// Widest allowed image print, in pixels.
    pub fn max_print_width_px(&self) -> f64 {
        f64::from(self.max_print_fraction) * f64::from(self.texture_size)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/config.rs"]
mod tests;
