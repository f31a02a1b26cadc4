//! # Adaptive Palette
//!
//! Quantizzazione NeuQuant condivisa dai backend locali: il re-encoder GIF
//! rimappa i frame su N colori, il re-encoder SVGA produce PNG indicizzati.

use crate::error::CompressError;
use color_quant::NeuQuant;

/// NeuQuant sampling factor (1 = slowest and best, 30 = fastest)
const SAMPLE_FACTOR: i32 = 10;

/// Palette of at most 256 RGBA entries learned from one image
pub struct Palette {
    quant: NeuQuant,
    colors: Vec<u8>,
}

impl Palette {
    /// Learn a palette of `colors` entries (clamped to 2..=256) from RGBA pixels
    pub fn learn(rgba: &[u8], colors: usize) -> Self {
        let quant = NeuQuant::new(SAMPLE_FACTOR, colors.clamp(2, 256), rgba);
        let colors = quant.color_map_rgba();
        Self { quant, colors }
    }

    pub fn len(&self) -> usize {
        self.colors.len() / 4
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Palette index of every pixel
    pub fn indices(&self, rgba: &[u8]) -> Vec<u8> {
        rgba.chunks_exact(4)
            .map(|pixel| self.quant.index_of(pixel) as u8)
            .collect()
    }

    /// Replace each pixel with its nearest palette entry
    pub fn remap(&self, rgba: &mut [u8]) {
        for pixel in rgba.chunks_exact_mut(4) {
            let i = self.quant.index_of(pixel) * 4;
            pixel.copy_from_slice(&self.colors[i..i + 4]);
        }
    }

    /// Encode `rgba` as an 8-bit indexed PNG with a tRNS chunk
    pub fn encode_png(&self, rgba: &[u8], width: u32, height: u32) -> Result<Vec<u8>, CompressError> {
        let indices = self.indices(rgba);
        let rgb: Vec<u8> = self.colors.chunks_exact(4).flat_map(|c| c[..3].to_vec()).collect();
        let alpha: Vec<u8> = self.colors.chunks_exact(4).map(|c| c[3]).collect();

        let mut out = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut out, width, height);
            encoder.set_color(png::ColorType::Indexed);
            encoder.set_depth(png::BitDepth::Eight);
            encoder.set_palette(rgb);
            encoder.set_trns(alpha);
            encoder.set_compression(png::Compression::Best);
            let mut writer = encoder.write_header().map_err(png_error)?;
            writer.write_image_data(&indices).map_err(png_error)?;
            writer.finish().map_err(png_error)?;
        }
        Ok(out)
    }
}

fn png_error(e: png::EncodingError) -> CompressError {
    CompressError::client(format!("indexed PNG encoding failed: {}", e))
}
