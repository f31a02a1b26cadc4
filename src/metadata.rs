//! # Metadata Probing Module
//!
//! Calcola le dimensioni (e i metadata specifici del formato) di un asset,
//! sia per il sorgente in fase di scan sia per l'artefatto ottimizzato.
//!
//! ## Strategie:
//! - **Raster** (PNG/JPEG/WebP/GIF): header letto con `image::image_dimensions`
//! - **SVG**: attributi `width`/`height` della radice, fallback su `viewBox`
//! - **SVGA**: `MovieParams` del container (viewBox, fps, frame, versione)
//!
//! Un fallimento viene riportato come `ParseError`.

use crate::error::CompressError;
use crate::file_manager::{AssetFamily, FileManager};
use crate::svga::MovieEntity;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Width/height plus format-specific metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view_box_width: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view_box_height: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fps: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frames: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl Dimensions {
    pub fn raster(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    /// Dimensions of an SVGA movie
    pub fn of_movie(movie: &MovieEntity) -> Self {
        let params = movie.params_or_default();
        Self {
            width: params.view_box_width.round() as u32,
            height: params.view_box_height.round() as u32,
            view_box_width: Some(params.view_box_width),
            view_box_height: Some(params.view_box_height),
            fps: Some(params.fps),
            frames: Some(params.frames),
            version: Some(movie.version.clone()),
        }
    }
}

/// Read the dimensions of `path` based on its extension
pub async fn read_dimensions(path: &Path) -> Result<Dimensions, CompressError> {
    let family = FileManager::extension(path)
        .and_then(|ext| AssetFamily::from_extension(&ext))
        .ok_or_else(|| CompressError::parse(format!("unsupported asset: {}", path.display())))?;

    match family {
        AssetFamily::RemoteRaster | AssetFamily::AnimatedRaster => {
            let owned = path.to_path_buf();
            let (width, height) = tokio::task::spawn_blocking(move || image::image_dimensions(&owned))
                .await
                .map_err(|e| CompressError::unknown(e.to_string()))?
                .map_err(|e| CompressError::parse(e.to_string()))?;
            Ok(Dimensions::raster(width, height))
        }
        AssetFamily::VectorMarkup => {
            let text = tokio::fs::read_to_string(path)
                .await
                .map_err(|e| CompressError::parse(e.to_string()))?;
            svg_dimensions(&text)
        }
        AssetFamily::AnimationContainer => {
            let movie = MovieEntity::read(path)
                .await
                .map_err(|e| CompressError::parse(e.message))?;
            Ok(Dimensions::of_movie(&movie))
        }
    }
}

/// Dimensions declared by an SVG document
pub fn svg_dimensions(markup: &str) -> Result<Dimensions, CompressError> {
    let doc = roxmltree::Document::parse(markup).map_err(|e| CompressError::parse(e.to_string()))?;
    let root = doc.root_element();
    if root.tag_name().name() != "svg" {
        return Err(CompressError::parse(format!(
            "root element is <{}>, expected <svg>",
            root.tag_name().name()
        )));
    }

    let view_box: Option<Vec<f32>> = root.attribute("viewBox").map(|vb| {
        vb.split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .filter_map(|s| s.parse().ok())
            .collect()
    });
    let (vb_width, vb_height) = match view_box.as_deref() {
        Some([_, _, w, h]) => (Some(*w), Some(*h)),
        _ => (None, None),
    };

    let width = root.attribute("width").and_then(parse_length).or(vb_width);
    let height = root.attribute("height").and_then(parse_length).or(vb_height);

    match (width, height) {
        (Some(w), Some(h)) => Ok(Dimensions::raster(w.round() as u32, h.round() as u32)),
        _ => Err(CompressError::parse(
            "SVG declares neither width/height nor a viewBox",
        )),
    }
}

/// Parse an absolute SVG length such as `24`, `24px` or `10.5pt`; percentages are rejected
fn parse_length(value: &str) -> Option<f32> {
    let value = value.trim();
    if value.ends_with('%') {
        return None;
    }
    let numeric: String = value
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == '-' || *c == '+' || *c == 'e')
        .collect();
    numeric.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_svg_dimensions_from_attributes() {
        let dims = svg_dimensions(r#"<svg xmlns="http://www.w3.org/2000/svg" width="24px" height="16"/>"#).unwrap();
        assert_eq!(dims, Dimensions::raster(24, 16));
    }

    #[test]
    fn test_svg_dimensions_from_view_box() {
        let dims = svg_dimensions(r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 100 50.4" width="100%"/>"#).unwrap();
        assert_eq!(dims, Dimensions::raster(100, 50));
    }

    #[test]
    fn test_svg_without_size_is_parse_error() {
        let err = svg_dimensions(r#"<svg xmlns="http://www.w3.org/2000/svg"/>"#).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Parse);
        assert!(svg_dimensions("<html/>").is_err());
    }

    #[tokio::test]
    async fn test_read_png_and_corrupt_file() {
        let temp = TempDir::new().unwrap();
        let png = temp.path().join("a.png");
        image::RgbaImage::from_pixel(7, 3, image::Rgba([1, 2, 3, 255]))
            .save(&png)
            .unwrap();
        assert_eq!(read_dimensions(&png).await.unwrap(), Dimensions::raster(7, 3));

        let broken = temp.path().join("b.jpg");
        tokio::fs::write(&broken, b"definitely not a jpeg").await.unwrap();
        let err = read_dimensions(&broken).await.unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Parse);
    }

    #[tokio::test]
    async fn test_read_svga_dimensions() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("anim.svga");
        let (_, bytes) = crate::svga::fixtures::movie_bytes(2);
        tokio::fs::write(&path, bytes).await.unwrap();

        let dims = read_dimensions(&path).await.unwrap();
        assert_eq!(dims.width, 750);
        assert_eq!(dims.frames, Some(48));
        assert_eq!(dims.fps, Some(20));
        assert_eq!(dims.version.as_deref(), Some("2.0.0"));
    }
}
