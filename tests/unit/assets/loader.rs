use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::*;
use crate::foundation::core::Rgba8Premul;

fn png_bytes(w: u32, h: u32, px: [u8; 4]) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(w, h, image::Rgba(px));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "printstack-loader-{name}-{}",
        std::process::id()
    ));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Loader whose futures finish after a per-URL delay and count how often each URL was asked for.
struct DelayLoader {
    delays: HashMap<String, Duration>,
    calls: AtomicUsize,
}

impl ImageLoader for DelayLoader {
    fn load(&self, url: &str) -> LoadFuture {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.delays.get(url).copied();
        let color = if url.starts_with("slow") {
            Rgba8Premul::from_straight_rgba(255, 0, 0, 255)
        } else {
            Rgba8Premul::from_straight_rgba(0, 0, 255, 255)
        };
        Box::pin(async move {
            match delay {
                Some(d) => tokio::time::sleep(d).await,
                None => std::future::pending::<()>().await,
            }
            Ok::<_, PrintstackError>(Arc::new(Bitmap::solid(1, 1, color)?))
        })
    }
}

#[test]
fn normalize_path_rules() {
    assert_eq!(normalize_rel_path("a/b.png").unwrap(), "a/b.png");
    assert_eq!(normalize_rel_path("a\\.\\b.png").unwrap(), "a/b.png");
    assert_eq!(normalize_rel_path("file://prints/x.png").unwrap(), "prints/x.png");
    assert!(normalize_rel_path("../x.png").is_err());
    assert!(normalize_rel_path("/abs.png").is_err());
    assert!(normalize_rel_path("C:/abs.png").is_err());
    assert!(normalize_rel_path("./").is_err());
}

#[tokio::test]
async fn fs_loader_reads_and_decodes_relative_files() {
    let dir = scratch_dir("fs");
    std::fs::create_dir_all(dir.join("prints")).unwrap();
    std::fs::write(dir.join("prints/red.png"), png_bytes(3, 2, [255, 0, 0, 255])).unwrap();

    let loader = FsImageLoader::new(&dir);
    let bmp = loader.load("prints/red.png").await.unwrap();
    assert_eq!((bmp.width(), bmp.height()), (3, 2));
    assert_eq!(bmp.sample(2, 1), [255, 0, 0, 255]);

    assert!(loader.load("prints/missing.png").await.is_err());
    assert!(matches!(
        loader.load("../escape.png").await,
        Err(PrintstackError::Validation(_))
    ));
    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn memory_loader_serves_registered_images() {
    let loader = MemoryImageLoader::new();
    loader
        .insert_encoded("logo.png", &png_bytes(2, 2, [0, 255, 0, 255]))
        .unwrap();
    assert_eq!(loader.load("logo.png").await.unwrap().sample(0, 0), [0, 255, 0, 255]);
    assert!(matches!(
        loader.load("other.png").await,
        Err(PrintstackError::Resolution(_))
    ));
    assert!(loader.remove("logo.png"));
    assert!(loader.load("logo.png").await.is_err());
}

#[tokio::test(start_paused = true)]
async fn results_follow_input_order_not_completion_order() {
    let loader = DelayLoader {
        delays: HashMap::from([
            ("slow.png".to_owned(), Duration::from_millis(300)),
            ("fast.png".to_owned(), Duration::from_millis(1)),
        ]),
        calls: AtomicUsize::new(0),
    };
    let slow = ImageRef::url("slow.png");
    let fast = ImageRef::url("fast.png");
    let refs = [Some(&slow), None, Some(&fast), Some(&slow)];

    let out = resolve_images(&loader, &refs, Duration::from_secs(1)).await;
    assert_eq!(out.len(), 4);
    assert!(out[1].is_none());
    let px = |i: usize| out[i].as_ref().unwrap().as_ref().unwrap().sample(0, 0);
    assert_eq!(px(0), [255, 0, 0, 255]);
    assert_eq!(px(2), [0, 0, 255, 255]);
    assert_eq!(px(3), [255, 0, 0, 255]);
    // Duplicate URLs are fetched once.
    assert_eq!(loader.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn stuck_loads_time_out() {
    let loader = DelayLoader {
        delays: HashMap::from([("fast.png".to_owned(), Duration::from_millis(5))]),
        calls: AtomicUsize::new(0),
    };
    let stuck = ImageRef::url("stuck.png");
    let fast = ImageRef::url("fast.png");
    let timeout = Duration::from_millis(50);

    let out = resolve_images(&loader, &[Some(&stuck), Some(&fast)], timeout).await;
    assert_eq!(out[0], Some(Err(LayerFailure::Timeout(timeout))));
    assert!(out[1].as_ref().unwrap().is_ok());
}

#[tokio::test]
async fn decoded_bitmaps_skip_the_loader() {
    let loader = MemoryImageLoader::new();
    let bmp = ImageRef::from(Bitmap::solid(1, 1, Rgba8Premul::white()).unwrap());
    let out = resolve_images(&loader, &[Some(&bmp)], Duration::from_millis(10)).await;
    assert_eq!(out[0].as_ref().unwrap().as_ref().unwrap().sample(0, 0), [255; 4]);
}
