//! # Animation Container Re-encoder
//!
//! Backend SVGA: decomprime il container, converte ogni frame PNG embedded in
//! un PNG indicizzato a 256 colori (palette NeuQuant) e ricomprime il tutto.
//!
//! ## Invarianti:
//! - Parametri del movie (viewBox, fps, frame), versione, sprite e audio invariati
//! - Chiavi delle immagini preservate
//! - Un frame ri-codificato più grande dell'originale viene scartato
//! - Le voci non PNG (es. audio embedded) passano senza modifiche

use super::encode_pool::EncodePool;
use super::palette::Palette;
use super::{ensure_dir, settle, CodecBackend, CodecOptions, CompressOutput};
use crate::error::{CompressError, CompressFailure};
use crate::file_manager::FileManager;
use crate::metadata::Dimensions;
use crate::svga::MovieEntity;
use async_trait::async_trait;
use std::path::Path;
use tracing::debug;

const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";

/// Palette size of re-encoded frames
const FRAME_COLORS: usize = 256;

pub struct SvgaReencoder {
    pool: EncodePool,
}

impl SvgaReencoder {
    pub fn new(pool: EncodePool) -> Self {
        Self { pool }
    }

    async fn run(&self, source: &Path, output_dir: &Path, options: &CodecOptions) -> Result<CompressOutput, CompressError> {
        let raw = tokio::fs::read(source).await?;
        let mut movie = self.pool.run(move || MovieEntity::decode_container(&raw)).await?;

        let frames = std::mem::take(&mut movie.images);
        let total = frames.len();
        let jobs = frames.into_iter().map(|(key, bytes)| {
            let pool = self.pool.clone();
            async move { pool.run(move || Ok(reencode_frame(&key, bytes))).await }
        });
        for frame in futures::future::join_all(jobs).await {
            let (key, bytes) = frame?;
            movie.images.insert(key, bytes);
        }
        debug!("Re-encoded {} embedded frames of {}", total, source.display());

        let dimensions = Dimensions::of_movie(&movie);
        let encoded = self.pool.run(move || movie.encode_container()).await?;

        ensure_dir(output_dir).await?;
        let output_path = options.output_path(source, output_dir)?;
        tokio::fs::write(&output_path, encoded).await?;
        let output_size = FileManager::file_size(&output_path).await?;

        Ok(CompressOutput {
            source_path: source.to_path_buf(),
            output_path,
            output_size,
            output_dimensions: dimensions,
        })
    }
}

/// Re-encode one embedded frame, keeping the original when it is not a PNG or no smaller
fn reencode_frame(key: &str, original: Vec<u8>) -> (String, Vec<u8>) {
    if !original.starts_with(PNG_MAGIC) {
        return (key.to_string(), original);
    }

    let img = match image::load_from_memory_with_format(&original, image::ImageFormat::Png) {
        Ok(img) => img,
        Err(e) => {
            debug!("Keeping undecodable frame {}: {}", key, e);
            return (key.to_string(), original);
        }
    };

    let rgba = img.to_rgba8();
    let palette = Palette::learn(rgba.as_raw(), FRAME_COLORS);
    match palette.encode_png(rgba.as_raw(), rgba.width(), rgba.height()) {
        Ok(out) if out.len() < original.len() => (key.to_string(), out),
        Ok(_) => (key.to_string(), original),
        Err(e) => {
            debug!("Keeping frame {} after encode failure: {}", key, e);
            (key.to_string(), original)
        }
    }
}

#[async_trait]
impl CodecBackend for SvgaReencoder {
    fn name(&self) -> &'static str {
        "container"
    }

    async fn compress(
        &self,
        source: &Path,
        output_dir: &Path,
        options: &CodecOptions,
    ) -> Result<CompressOutput, CompressFailure> {
        settle(self.name(), source, self.run(source, output_dir, options).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::svga::fixtures::{movie_bytes, solid_png};
    use tempfile::TempDir;

    fn options() -> CodecOptions {
        CodecOptions {
            postfix: "_min".to_string(),
            gif_colors: 10,
        }
    }

    #[tokio::test]
    async fn test_reencode_preserves_structure_and_shrinks() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("gift.svga");
        let (original, bytes) = movie_bytes(3);
        std::fs::write(&source, &bytes).unwrap();
        let out_dir = temp.path().join("session");

        let backend = SvgaReencoder::new(EncodePool::new(Some(2)));
        let output = backend.compress(&source, &out_dir, &options()).await.unwrap();

        assert_eq!(output.output_path, out_dir.join("gift_min.svga"));
        assert!(output.output_size <= bytes.len() as u64);
        assert_eq!(output.output_dimensions, Dimensions::of_movie(&original));

        let reread = MovieEntity::read(&output.output_path).await.unwrap();
        assert_eq!(reread.params, original.params);
        assert_eq!(reread.version, original.version);
        assert_eq!(reread.sprites, original.sprites);
        let mut keys: Vec<_> = reread.images.keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, vec!["img_0", "img_1", "img_2"]);
        for (key, frame) in &reread.images {
            let decoded = image::load_from_memory(frame).unwrap();
            assert_eq!((decoded.width(), decoded.height()), (64, 48), "frame {}", key);
        }
    }

    #[test]
    fn test_non_png_entries_pass_through() {
        let audio = b"ID3\x03\x00fake mp3".to_vec();
        assert_eq!(reencode_frame("audio_0", audio.clone()), ("audio_0".to_string(), audio));
    }

    #[test]
    fn test_frame_is_never_grown() {
        let frame = solid_png(16, 16, [1, 2, 3, 255]);
        let (_, out) = reencode_frame("f", frame.clone());
        assert!(out.len() <= frame.len());
    }

    #[test]
    fn test_gradient_frame_becomes_smaller_indexed_png() {
        use image::codecs::png::PngEncoder;
        use image::{ImageEncoder, Rgba, RgbaImage};

        // gradient with per-pixel noise so lossless deflate cannot do much
        let mut seed: u32 = 7;
        let img = RgbaImage::from_fn(64, 64, |x, y| {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            let noise = (seed >> 16) as u8 % 24;
            Rgba([(x * 3) as u8 + noise, (y * 3) as u8 + noise, 180 - noise, 255])
        });
        let mut frame = Vec::new();
        PngEncoder::new(&mut frame)
            .write_image(img.as_raw(), 64, 64, image::ColorType::Rgba8)
            .unwrap();

        let (key, out) = reencode_frame("grad", frame.clone());
        assert_eq!(key, "grad");
        assert!(out.len() < frame.len(), "{} >= {}", out.len(), frame.len());
        let decoded = image::load_from_memory(&out).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 64));
    }

    #[tokio::test]
    async fn test_corrupt_container_is_client_error() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("broken.svga");
        std::fs::write(&source, b"not zlib at all").unwrap();

        let backend = SvgaReencoder::new(EncodePool::new(Some(1)));
        let failure = backend.compress(&source, temp.path(), &options()).await.unwrap_err();
        assert_eq!(failure.kind(), ErrorKind::Client);
        assert_eq!(failure.source_path, source);
    }
}
