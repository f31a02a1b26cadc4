//! # Animated Raster Re-encoder
//!
//! Backend GIF: riduce la palette e ri-codifica tutti i frame dell'animazione.
//!
//! ## Strategia:
//! - `gifsicle -O3 --colors N` se disponibile
//! - altrimenti encoder interno (`image`) sul pool di encoding, con una
//!   palette adattiva NeuQuant di N colori per frame
//!
//! Numero di frame, ritardi e loop infinito vengono preservati.

use super::encode_pool::EncodePool;
use super::palette::Palette;
use super::{describe_output, ensure_dir, run_tool, settle, CodecBackend, CodecOptions, CompressOutput};
use crate::error::{CompressError, CompressFailure};
use crate::tool_resolver::ToolPathResolver;
use crate::utils::{tool_args, ToolArg};
use async_trait::async_trait;
use image::codecs::gif::{GifDecoder, GifEncoder, Repeat};
use image::{AnimationDecoder, Frame};
use std::path::Path;
use tracing::debug;

pub struct GifReencoder {
    tools: ToolPathResolver,
    pool: EncodePool,
}

impl GifReencoder {
    pub fn new(tools: ToolPathResolver, pool: EncodePool) -> Self {
        Self { tools, pool }
    }

    async fn run(&self, source: &Path, output_dir: &Path, options: &CodecOptions) -> Result<CompressOutput, CompressError> {
        ensure_dir(output_dir).await?;
        let output_path = options.output_path(source, output_dir)?;
        let colors = options.gif_colors.clamp(2, 256);

        match self.tools.resolve_tool("gifsicle") {
            Some(program) => {
                let colors = colors.to_string();
                let args = tool_args([
                    ToolArg::Flag("-O3"),
                    ToolArg::Flag("--colors"),
                    ToolArg::Flag(&colors),
                    ToolArg::Path(source),
                    ToolArg::Flag("-o"),
                    ToolArg::Path(&output_path),
                ]);
                run_tool("gifsicle", &program, &args).await?;
            }
            None => {
                debug!("gifsicle not available, re-encoding {} in-process", source.display());
                let from = source.to_path_buf();
                let to = output_path.clone();
                self.pool.run(move || reencode(&from, &to, colors)).await?;
            }
        }

        describe_output(source, output_path).await
    }
}

/// Decode every frame, reduce its palette and write a looping GIF
fn reencode(source: &Path, target: &Path, colors: u16) -> Result<(), CompressError> {
    let file = std::fs::File::open(source)?;
    let decoder = GifDecoder::new(std::io::BufReader::new(file)).map_err(corrupt)?;
    let frames = decoder.into_frames().collect_frames().map_err(corrupt)?;

    let reduced = frames.into_iter().map(|frame| {
        let left = frame.left();
        let top = frame.top();
        let delay = frame.delay();
        let mut buffer = frame.into_buffer();
        let palette = Palette::learn(buffer.as_raw(), usize::from(colors));
        palette.remap(&mut buffer);
        Frame::from_parts(buffer, left, top, delay)
    });

    let mut encoded = Vec::new();
    {
        let mut encoder = GifEncoder::new_with_speed(&mut encoded, 10);
        encoder.set_repeat(Repeat::Infinite)?;
        encoder.encode_frames(reduced)?;
    }
    std::fs::write(target, encoded)?;
    Ok(())
}

fn corrupt(e: image::ImageError) -> CompressError {
    CompressError::client(format!("cannot decode GIF: {}", e))
}

#[async_trait]
impl CodecBackend for GifReencoder {
    fn name(&self) -> &'static str {
        "raster"
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
    use image::{Delay, Rgba, RgbaImage};
    use tempfile::TempDir;

    fn write_gradient_gif(path: &Path, frames: u32) {
        let frames = (0..frames).map(|i| {
            let buffer = RgbaImage::from_fn(24, 12, |x, y| Rgba([(x * 10 + i) as u8, (y * 20) as u8, 128, 255]));
            Frame::from_parts(buffer, 0, 0, Delay::from_numer_denom_ms(80, 1))
        });
        let mut bytes = Vec::new();
        {
            let mut encoder = GifEncoder::new(&mut bytes);
            encoder.set_repeat(Repeat::Infinite).unwrap();
            encoder.encode_frames(frames).unwrap();
        }
        std::fs::write(path, bytes).unwrap();
    }

    fn options() -> CodecOptions {
        CodecOptions {
            postfix: String::new(),
            gif_colors: 10,
        }
    }

    #[tokio::test]
    async fn test_in_process_reencode_keeps_frames() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("spin.gif");
        write_gradient_gif(&source, 3);
        let out_dir = temp.path().join("session");

        let backend = GifReencoder::new(
            ToolPathResolver::isolated(temp.path().join("no-tools")),
            EncodePool::new(Some(1)),
        );
        let output = backend.compress(&source, &out_dir, &options()).await.unwrap();
        assert_eq!(output.output_path, out_dir.join("spin.gif"));
        assert_eq!(output.output_dimensions.width, 24);
        assert_eq!(output.output_dimensions.height, 12);

        let decoder = GifDecoder::new(std::fs::File::open(&output.output_path).unwrap()).unwrap();
        assert_eq!(decoder.into_frames().collect_frames().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_in_process_palette_keeps_muted_colours() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("fog.gif");
        let frames = (0..2u32).map(|i| {
            let buffer = RgbaImage::from_fn(64, 32, |x, _| Rgba([100 + (x * 45 / 64) as u8, 120, 140 + i as u8, 255]));
            Frame::from_parts(buffer, 0, 0, Delay::from_numer_denom_ms(100, 1))
        });
        let mut bytes = Vec::new();
        {
            let mut encoder = GifEncoder::new(&mut bytes);
            encoder.encode_frames(frames).unwrap();
        }
        std::fs::write(&source, bytes).unwrap();

        let backend = GifReencoder::new(
            ToolPathResolver::isolated(temp.path().join("no-tools")),
            EncodePool::new(Some(1)),
        );
        let output = backend.compress(&source, &temp.path().join("out"), &options()).await.unwrap();

        let decoder = GifDecoder::new(std::fs::File::open(&output.output_path).unwrap()).unwrap();
        for frame in decoder.into_frames().collect_frames().unwrap() {
            for pixel in frame.buffer().pixels() {
                assert!((i32::from(pixel.0[1]) - 120).abs() <= 30, "{:?}", pixel);
                assert!((i32::from(pixel.0[2]) - 140).abs() <= 30, "{:?}", pixel);
            }
        }
    }

    #[tokio::test]
    async fn test_corrupt_gif_is_client_error() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("bad.gif");
        std::fs::write(&source, b"GIF89a nope").unwrap();

        let backend = GifReencoder::new(
            ToolPathResolver::isolated(temp.path().join("no-tools")),
            EncodePool::new(Some(1)),
        );
        let failure = backend.compress(&source, temp.path().join("out").as_path(), &options()).await.unwrap_err();
        assert_eq!(failure.kind(), ErrorKind::Client);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_gifsicle_is_preferred_when_present() {
        use std::os::unix::fs::PermissionsExt;
        let temp = TempDir::new().unwrap();
        let tools = temp.path().join("tools");
        std::fs::create_dir(&tools).unwrap();
        let script = tools.join("gifsicle");
        // gifsicle -O3 --colors N <in> -o <out>
        std::fs::write(&script, "#!/bin/sh\n[ \"$3\" = \"10\" ] || exit 9\ncp \"$4\" \"$6\"\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let source = temp.path().join("spin.gif");
        write_gradient_gif(&source, 2);
        let backend = GifReencoder::new(ToolPathResolver::isolated(&tools), EncodePool::new(Some(1)));
        let output = backend.compress(&source, &temp.path().join("out"), &options()).await.unwrap();
        assert_eq!(output.output_size, std::fs::metadata(&source).unwrap().len());
    }
}
