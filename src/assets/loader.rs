use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use anyhow::Context as _;
use tokio::task::JoinSet;

use crate::assets::bitmap::{Bitmap, ImageRef};
use crate::assets::decode::decode_any;
use crate::foundation::error::{PrintstackError, PrintstackResult};
use crate::render::warning::LayerFailure;

/// Boxed future produced by [`ImageLoader::load`].
pub type LoadFuture =
    Pin<Box<dyn Future<Output = PrintstackResult<Arc<Bitmap>>> + Send + 'static>>;

/// Resolves image URLs to decoded bitmaps.
///
/// The returned future must not borrow the loader; it is driven on a runtime task, possibly
/// after the call that created it has moved on.
pub trait ImageLoader: Send + Sync {
    /// Start loading `url`.
    fn load(&self, url: &str) -> LoadFuture;
}

/// Normalize and validate root-relative image paths.
///
/// The result uses `/` separators and has `.` segments removed. Absolute paths and parent
/// traversals (`..`) are rejected.
pub(crate) fn normalize_rel_path(source: &str) -> PrintstackResult<String> {
    let s = source.replace('\\', "/");
    let s = s.strip_prefix("file://").unwrap_or(&s);
    if s.starts_with('/') || s.contains(':') {
        return Err(PrintstackError::validation("image paths must be relative"));
    }
    if s.is_empty() {
        return Err(PrintstackError::validation("image path must be non-empty"));
    }

    let mut out = Vec::<&str>::new();
    for part in s.split('/') {
        if part.is_empty() || part == "." {
            continue;
        }
        if part == ".." {
            return Err(PrintstackError::validation("image paths must not contain '..'"));
        }
        out.push(part);
    }

    if out.is_empty() {
        return Err(PrintstackError::validation(
            "image path must contain a file name",
        ));
    }

    Ok(out.join("/"))
}

/// Loads images from files below a root directory.
#[derive(Clone, Debug)]
pub struct FsImageLoader {
    root: PathBuf,
}

impl FsImageLoader {
    /// Resolve every URL relative to `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ImageLoader for FsImageLoader {
    fn load(&self, url: &str) -> LoadFuture {
        let rel = match normalize_rel_path(url) {
            Ok(rel) => rel,
            Err(e) => return Box::pin(std::future::ready(Err(e))),
        };
        let path = self.root.join(&rel);
        Box::pin(async move {
            let bytes = tokio::fs::read(&path)
                .await
                .with_context(|| format!("read image '{}'", path.display()))?;
            let bitmap = tokio::task::spawn_blocking(move || decode_any(&bytes, Some(&rel)))
                .await
                .context("image decode task")??;
            Ok::<_, PrintstackError>(Arc::new(bitmap))
        })
    }
}

/// In-memory loader keyed by exact URL string. Useful for hosts that already hold decoded
/// uploads, and for tests.
#[derive(Debug, Default)]
pub struct MemoryImageLoader {
    images: RwLock<HashMap<String, Arc<Bitmap>>>,
}

impl MemoryImageLoader {
    /// Empty loader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register decoded pixels under `url`, replacing any previous entry.
    pub fn insert_bitmap(&self, url: impl Into<String>, bitmap: Bitmap) {
        self.images
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url.into(), Arc::new(bitmap));
    }

    /// Decode `bytes` now and register the result under `url`.
    pub fn insert_encoded(&self, url: impl Into<String>, bytes: &[u8]) -> PrintstackResult<()> {
        let url = url.into();
        let bitmap = decode_any(bytes, Some(&url))?;
        self.insert_bitmap(url, bitmap);
        Ok(())
    }

    /// Drop the entry for `url`.
    pub fn remove(&self, url: &str) -> bool {
        self.images
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(url)
            .is_some()
    }
}

impl ImageLoader for MemoryImageLoader {
    fn load(&self, url: &str) -> LoadFuture {
        let found = self
            .images
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(url)
            .cloned();
        let out = found
            .ok_or_else(|| PrintstackError::resolution(format!("no image registered for '{url}'")));
        Box::pin(std::future::ready(out))
    }
}

/// Outcome of resolving one image reference.
pub type ImageResolution = Result<Arc<Bitmap>, LayerFailure>;

/// Resolve every reference concurrently and return results in input order.
///
/// Each distinct URL is loaded once, on its own task, bounded by `timeout`. Results are stored
/// by index, so the order in which loads finish never shows up in the output. `None` entries
/// (layers that need no image) come back as `None`.
pub async fn resolve_images(
    loader: &dyn ImageLoader,
    refs: &[Option<&ImageRef>],
    timeout: Duration,
) -> Vec<Option<ImageResolution>> {
    let mut out: Vec<Option<ImageResolution>> = refs
        .iter()
        .map(|r| match r {
            Some(ImageRef::Bitmap(b)) => Some(Ok(Arc::clone(b))),
            Some(ImageRef::Url(_)) => Some(Err(LayerFailure::Load(
                "image load did not complete".to_owned(),
            ))),
            None => None,
        })
        .collect();

    let mut slots: HashMap<&str, Vec<usize>> = HashMap::new();
    let mut urls: Vec<&str> = Vec::new();
    for (i, r) in refs.iter().enumerate() {
        if let Some(ImageRef::Url(url)) = r {
            let entry = slots.entry(url.as_str()).or_default();
            if entry.is_empty() {
                urls.push(url.as_str());
            }
            entry.push(i);
        }
    }
    if urls.is_empty() {
        return out;
    }

    let mut set = JoinSet::new();
    for (u, url) in urls.iter().enumerate() {
        let fut = loader.load(url);
        set.spawn(async move {
            let res = match tokio::time::timeout(timeout, fut).await {
                Ok(Ok(bitmap)) => Ok(bitmap),
                Ok(Err(e)) => Err(LayerFailure::Load(e.to_string())),
                Err(_) => Err(LayerFailure::Timeout(timeout)),
            };
            (u, res)
        });
    }

    while let Some(joined) = set.join_next().await {
        let (u, res) = match joined {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "image load task failed");
                continue;
            }
        };
        let url = urls[u];
        match &res {
            Ok(b) => tracing::debug!(url, width = b.width(), height = b.height(), "image resolved"),
            Err(failure) => tracing::debug!(url, %failure, "image failed to resolve"),
        }
        for &i in slots.get(url).map(Vec::as_slice).unwrap_or_default() {
            out[i] = Some(res.clone());
        }
    }
    out
}

#[cfg(test)]
#[path = "../../tests/unit/assets/loader.rs"]
mod tests;
