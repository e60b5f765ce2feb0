use std::sync::Arc;

use xxhash_rust::xxh3::xxh3_128_with_seed;

use crate::assets::bitmap::ImageRef;
use crate::foundation::config::EngineConfig;
use crate::scene::layer::{LayerKind, PrintLayer};
use crate::scene::request::{BaseTexture, CompositeRequest};

const XXH3_SEED: u64 = 0x8b5a_d4a0_c7d8_e9f1;
const KEY_FORMAT_VERSION: u8 = 1;

/// Content address of a composite.
///
/// Built from a canonical, self-delimiting byte encoding of everything that affects output
/// pixels: engine settings, the base texture, and every layer in draw order. Equality compares
/// the canonical bytes, so two keys are equal exactly when their inputs are; the 128-bit xxh3
/// digest only feeds `Hash` and display.
#[derive(Clone)]
pub struct CompositeKey {
    hi: u64,
    lo: u64,
    canonical: Arc<[u8]>,
}

impl CompositeKey {
    /// Key for `request` under `config`. The component id is not part of the key.
    pub fn for_request(request: &CompositeRequest, config: &EngineConfig) -> Self {
        let mut w = KeyWriter::default();
        w.write_u8(KEY_FORMAT_VERSION);
        w.write_u32(config.texture_size);
        w.write_f32(config.max_print_fraction);
        w.write_bytes(&config.base_fill_rgba.to_array());
        write_base(&mut w, &request.base);

        let order = request.draw_order();
        w.write_u64(order.len() as u64);
        for (index, layer) in order {
            w.write_u64(index as u64);
            write_layer(&mut w, layer);
        }
        w.finish()
    }

    /// 128-bit digest as 32 lowercase hex digits.
    pub fn digest_hex(&self) -> String {
        format!("{:016x}{:016x}", self.hi, self.lo)
    }

    /// Canonical encoding the key was built from.
    pub fn canonical_bytes(&self) -> &[u8] {
        &self.canonical
    }
}

impl PartialEq for CompositeKey {
    fn eq(&self, other: &Self) -> bool {
        self.hi == other.hi && self.lo == other.lo && self.canonical == other.canonical
    }
}

impl Eq for CompositeKey {}

impl std::hash::Hash for CompositeKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        state.write_u64(self.hi);
        state.write_u64(self.lo);
    }
}

impl std::fmt::Debug for CompositeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CompositeKey({})", self.digest_hex())
    }
}

impl std::fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.digest_hex())
    }
}

fn write_base(w: &mut KeyWriter, base: &BaseTexture) {
    w.write_str(&base.identity);
    match base.drawable_source() {
        None => w.write_u8(0),
        Some(src) => write_image_ref(w, src),
    }
}

fn write_image_ref(w: &mut KeyWriter, r: &ImageRef) {
    match r {
        ImageRef::Url(url) => {
            w.write_u8(1);
            w.write_str(url);
        }
        ImageRef::Bitmap(b) => {
            w.write_u8(2);
            w.write_u128(b.content_id());
        }
    }
}

fn write_opt_u32(w: &mut KeyWriter, v: Option<u32>) {
    match v {
        None => w.write_u8(0),
        Some(v) => {
            w.write_u8(1);
            w.write_u32(v);
        }
    }
}

fn write_layer(w: &mut KeyWriter, layer: &PrintLayer) {
    w.write_str(&layer.id);
    w.write_f64(layer.position.u);
    w.write_f64(layer.position.v);
    w.write_f64(layer.scale);
    w.write_f64(layer.normalized_rotation());
    w.write_f64(layer.clamped_opacity());
    w.write_u8(layer.blend_mode.tag());
    w.write_i32(layer.z_index);

    match &layer.kind {
        LayerKind::Image(img) => {
            w.write_u8(b'I');
            write_image_ref(w, &img.image_ref);
            write_opt_u32(w, img.width);
            write_opt_u32(w, img.height);
        }
        LayerKind::Text(text) => {
            w.write_u8(b'T');
            w.write_str(&text.content);
            w.write_str(&text.font_family.to_ascii_lowercase());
            w.write_f64(text.font_size_px);
            w.write_u32(u32::from(text.font_weight));
            w.write_bytes(&[text.color.r, text.color.g, text.color.b, text.color.a]);
            w.write_u8(text.text_align.tag());
        }
    }
}

/// Canonical little-endian encoder. Strings are length-prefixed so adjacent fields can never
/// run into each other.
#[derive(Default)]
struct KeyWriter {
    buf: Vec<u8>,
}

impl KeyWriter {
    fn write_bytes(&mut self, b: &[u8]) {
        self.buf.extend_from_slice(b);
    }

    fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn write_u32(&mut self, v: u32) {
        self.write_bytes(&v.to_le_bytes());
    }

    fn write_i32(&mut self, v: i32) {
        self.write_bytes(&v.to_le_bytes());
    }

    fn write_u64(&mut self, v: u64) {
        self.write_bytes(&v.to_le_bytes());
    }

    fn write_u128(&mut self, v: u128) {
        self.write_bytes(&v.to_le_bytes());
    }

    // `+ 0.0` folds -0.0 into 0.0.
    fn write_f32(&mut self, v: f32) {
        self.write_u32((v + 0.0).to_bits());
    }

    fn write_f64(&mut self, v: f64) {
        self.write_u64((v + 0.0).to_bits());
    }

    fn write_str(&mut self, s: &str) {
        self.write_u64(s.len() as u64);
        self.write_bytes(s.as_bytes());
    }

    fn finish(self) -> CompositeKey {
        let v = xxh3_128_with_seed(&self.buf, XXH3_SEED);
        CompositeKey {
            hi: (v >> 64) as u64,
            lo: v as u64,
            canonical: Arc::from(self.buf),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/cache/fingerprint.rs"]
mod tests;
