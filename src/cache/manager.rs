use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::Context as _;
use tokio::time::Instant;

use crate::assets::loader::ImageLoader;
use crate::assets::text::TextRasterizer;
use crate::cache::fingerprint::CompositeKey;
use crate::cache::handle::TextureHandle;
use crate::foundation::config::EngineConfig;
use crate::foundation::error::{PrintstackError, PrintstackResult};
use crate::render::compositor::{ComposeOutput, Compositor};
use crate::render::warning::CompositeWarning;
use crate::scene::request::CompositeRequest;

/// Whether a composite came from the cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheStatus {
    /// Served from an existing entry.
    Hit,
    /// Freshly composited and stored.
    Miss,
}

/// Result of [`CompositeCache::get_or_create`].
#[derive(Clone, Debug)]
pub struct Composite {
    /// Content address of the composite.
    pub key: CompositeKey,
    /// Shared texture. Owned by the cache: do not dispose it yourself.
    pub handle: Arc<TextureHandle>,
    /// Layers (or base) that were skipped when the texture was built.
    pub warnings: Arc<[CompositeWarning]>,
    /// Hit or miss.
    pub status: CacheStatus,
}

/// Result of [`CompositeCache::render_uncached`]. The caller owns and disposes the handle.
#[derive(Debug)]
pub struct UncachedComposite {
    /// Caller-owned texture.
    pub handle: TextureHandle,
    /// Layers (or base) that were skipped.
    pub warnings: Vec<CompositeWarning>,
}

/// Cache counters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Requests served from an entry.
    pub hits: u64,
    /// Requests that had to composite.
    pub misses: u64,
    /// Entries stored.
    pub inserts: u64,
    /// Entries removed by age, capacity, or `clear_all`.
    pub evictions: u64,
    /// Completions dropped because a newer request for the same component won.
    pub superseded: u64,
}

struct CacheEntry {
    handle: Arc<TextureHandle>,
    warnings: Arc<[CompositeWarning]>,
    last_used: Instant,
}

/// Per-key compose lock plus the number of callers holding or queued on it.
struct InFlight {
    lock: Arc<tokio::sync::Mutex<()>>,
    callers: usize,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<CompositeKey, CacheEntry>,
    in_flight: HashMap<CompositeKey, InFlight>,
    latest_by_component: HashMap<String, CompositeKey>,
    epoch: u64,
    stats: CacheStats,
}

impl CacheState {
    fn lookup(&mut self, key: &CompositeKey, now: Instant) -> Option<Composite> {
        let entry = self.entries.get_mut(key)?;
        if entry.handle.is_disposed() {
            tracing::debug!(key = %key, "cached texture was disposed externally, recompositing");
            self.entries.remove(key);
            return None;
        }
        entry.last_used = now;
        self.stats.hits += 1;
        tracing::debug!(key = %key, "composite cache hit");
        Some(Composite {
            key: key.clone(),
            handle: Arc::clone(&entry.handle),
            warnings: Arc::clone(&entry.warnings),
            status: CacheStatus::Hit,
        })
    }

    fn is_stale(&self, component_id: &str, key: &CompositeKey, epoch: u64) -> bool {
        self.epoch != epoch || self.latest_by_component.get(component_id) != Some(key)
    }

    /// Drop least recently used entries beyond `cap`, never touching `keep`.
    fn enforce_capacity(&mut self, cap: usize, keep: &CompositeKey) -> Vec<Arc<TextureHandle>> {
        let mut evicted = Vec::new();
        while self.entries.len() > cap {
            let victim = self
                .entries
                .iter()
                .filter(|(k, _)| *k != keep)
                .min_by_key(|(_, e)| e.last_used)
                .map(|(k, _)| k.clone());
            let Some(victim) = victim else {
                break;
            };
            if let Some(entry) = self.entries.remove(&victim) {
                tracing::debug!(key = %victim, "composite evicted (capacity)");
                evicted.push(entry.handle);
            }
        }
        self.stats.evictions += evicted.len() as u64;
        evicted
    }
}

/// Leaves the in-flight slot of a key when a caller is done with it, even if the caller's
/// future is dropped half-way. The slot goes away with its last caller, so callers queued
/// behind a failed or superseded leader keep sharing one lock.
struct InFlightCleanup<'a> {
    state: &'a Mutex<CacheState>,
    key: CompositeKey,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl Drop for InFlightCleanup<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let remaining = match state.in_flight.get_mut(&self.key) {
            Some(flight) if Arc::ptr_eq(&flight.lock, &self.lock) => {
                flight.callers = flight.callers.saturating_sub(1);
                flight.callers
            }
            _ => return,
        };
        if remaining == 0 {
            state.in_flight.remove(&self.key);
        }
    }
}

/// Content-addressed cache of composited textures.
///
/// Owned by the host application and shared behind an `Arc`. All map mutation happens under one
/// short-lived lock that is never held across an await point; compositing itself runs outside
/// the lock, serialized per key so concurrent requests for the same key composite once.
pub struct CompositeCache {
    compositor: Arc<Compositor>,
    loader: Arc<dyn ImageLoader>,
    state: Mutex<CacheState>,
}

impl std::fmt::Debug for CompositeCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeCache")
            .field("entries", &self.len())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl CompositeCache {
    /// Cache drawing images through `loader` and text through `text`.
    ///
    /// Text layers only render with families `text` knows about; keep your own handle to a
    /// [`ParleyTextRasterizer`](crate::ParleyTextRasterizer) to register fonts on it.
    pub fn new(
        config: EngineConfig,
        loader: Arc<dyn ImageLoader>,
        text: Arc<dyn TextRasterizer>,
    ) -> PrintstackResult<Self> {
        let compositor = Arc::new(Compositor::new(config, text)?);
        Ok(Self {
            compositor,
            loader,
            state: Mutex::new(CacheState::default()),
        })
    }

    /// Engine settings in use.
    pub fn config(&self) -> &EngineConfig {
        self.compositor.config()
    }

    /// The underlying compositor.
    pub fn compositor(&self) -> &Arc<Compositor> {
        &self.compositor
    }

    fn state(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Key `request` would be cached under.
    pub fn key_for(&self, request: &CompositeRequest) -> CompositeKey {
        CompositeKey::for_request(request, self.config())
    }

    /// Return the cached texture for `request`, compositing it on a miss.
    ///
    /// Concurrent calls with the same key composite once; later callers wait and then hit.
    /// If a newer request for the same component arrives (or [`CompositeCache::clear_all`]
    /// runs) before this one finishes, the result is disposed instead of cached and
    /// [`PrintstackError::Superseded`] is returned. A caller that is already superseded when
    /// its turn on the key comes returns that error without compositing.
    #[tracing::instrument(
        level = "debug",
        skip(self, request),
        fields(component = %request.component_id)
    )]
    pub async fn get_or_create(&self, request: &CompositeRequest) -> PrintstackResult<Composite> {
        let key = self.key_for(request);
        let (epoch, lock) = {
            let mut state = self.state();
            state
                .latest_by_component
                .insert(request.component_id.clone(), key.clone());
            if let Some(hit) = state.lookup(&key, Instant::now()) {
                return Ok(hit);
            }
            let flight = state
                .in_flight
                .entry(key.clone())
                .or_insert_with(|| InFlight {
                    lock: Arc::default(),
                    callers: 0,
                });
            flight.callers += 1;
            let lock = Arc::clone(&flight.lock);
            (state.epoch, lock)
        };

        let cleanup = InFlightCleanup {
            state: &self.state,
            key: key.clone(),
            lock,
        };
        let _composing = cleanup.lock.lock().await;

        {
            let mut state = self.state();
            if let Some(hit) = state.lookup(&key, Instant::now()) {
                return Ok(hit);
            }
            if state.is_stale(&request.component_id, &key, epoch) {
                state.stats.superseded += 1;
                tracing::debug!(key = %key, "request superseded while queued, not compositing");
                return Err(PrintstackError::superseded(request.component_id.clone()));
            }
            state.stats.misses += 1;
        }
        tracing::debug!(key = %key, "composite cache miss");

        let output = self.render(request).await?;
        let handle = Arc::new(TextureHandle::new(output.buffer));
        let warnings: Arc<[CompositeWarning]> = output.warnings.into_vec().into();

        let (replaced, evicted) = {
            let mut state = self.state();
            if state.is_stale(&request.component_id, &key, epoch) {
                state.stats.superseded += 1;
                drop(state);
                tracing::debug!(key = %key, "composite superseded, dropping result");
                handle.dispose();
                return Err(PrintstackError::superseded(request.component_id.clone()));
            }
            // Another path may have stored this key meanwhile; its handle stays the shared one.
            if let Some(existing) = state.lookup(&key, Instant::now()) {
                drop(state);
                handle.dispose();
                return Ok(existing);
            }
            let replaced = state.entries.insert(
                key.clone(),
                CacheEntry {
                    handle: Arc::clone(&handle),
                    warnings: Arc::clone(&warnings),
                    last_used: Instant::now(),
                },
            );
            state.stats.inserts += 1;
            let cap = self.config().max_cache_entries;
            let evicted = state.enforce_capacity(cap, &key);
            (replaced, evicted)
        };
        if let Some(old) = replaced {
            old.handle.dispose();
        }
        for h in evicted {
            h.dispose();
        }

        Ok(Composite {
            key,
            handle,
            warnings,
            status: CacheStatus::Miss,
        })
    }

    /// Composite without touching the cache. The caller owns the returned handle.
    pub async fn render_uncached(
        &self,
        request: &CompositeRequest,
    ) -> PrintstackResult<UncachedComposite> {
        let output = self.render(request).await?;
        Ok(UncachedComposite {
            handle: TextureHandle::new(output.buffer),
            warnings: output.warnings.into_vec(),
        })
    }

    async fn render(&self, request: &CompositeRequest) -> PrintstackResult<ComposeOutput> {
        let resolved = self.compositor.resolve(request, self.loader.as_ref()).await;
        let compositor = Arc::clone(&self.compositor);
        let request = request.clone();
        tokio::task::spawn_blocking(move || compositor.compose(&request, &resolved))
            .await
            .context("composite task")?
    }

    /// Remove and dispose every entry unused for at least `max_age`. Returns how many went.
    pub fn evict_stale(&self, max_age: Duration) -> usize {
        let now = Instant::now();
        let evicted: Vec<Arc<TextureHandle>> = {
            let mut state = self.state();
            let stale: Vec<CompositeKey> = state
                .entries
                .iter()
                .filter(|(_, e)| now.saturating_duration_since(e.last_used) >= max_age)
                .map(|(k, _)| k.clone())
                .collect();
            let handles: Vec<_> = stale
                .iter()
                .filter_map(|k| state.entries.remove(k))
                .map(|e| e.handle)
                .collect();
            state.stats.evictions += handles.len() as u64;
            handles
        };
        for h in &evicted {
            h.dispose();
        }
        if !evicted.is_empty() {
            tracing::debug!(count = evicted.len(), ?max_age, "evicted stale composites");
        }
        evicted.len()
    }

    /// Dispose every cached texture and forget in-flight requests. Returns how many entries went.
    pub fn clear_all(&self) -> usize {
        let entries = {
            let mut state = self.state();
            state.epoch += 1;
            state.latest_by_component.clear();
            let entries = std::mem::take(&mut state.entries);
            state.stats.evictions += entries.len() as u64;
            entries
        };
        let n = entries.len();
        for entry in entries.into_values() {
            entry.handle.dispose();
        }
        tracing::info!(count = n, "composite cache cleared");
        n
    }

    /// Counter snapshot.
    pub fn stats(&self) -> CacheStats {
        self.state().stats.clone()
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.state().entries.len()
    }

    /// `true` when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `true` when `key` has a live entry.
    pub fn contains(&self, key: &CompositeKey) -> bool {
        self.state()
            .entries
            .get(key)
            .is_some_and(|e| !e.handle.is_disposed())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/cache/manager.rs"]
mod tests;
