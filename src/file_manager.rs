//! # File Management Module
//!
//! Questo modulo gestisce le operazioni sui file e la classificazione degli asset.
//!
//! ## Responsabilità:
//! - Classificazione per estensione (case-insensitive) nelle famiglie di formato
//! - Calcolo del nome di output `stem + postfix + ext`
//! - Informazioni sui file (dimensione) e copia verso la destinazione
//! - Formattazione human-readable delle dimensioni e percentuali di riduzione
//!
//! ## Famiglie supportate:
//! - **Raster lossy (remoto)**: PNG, JPG, JPEG, WebP
//! - **Vettoriale**: SVG
//! - **Raster animato**: GIF
//! - **Container animazione**: SVGA
//!
//! ## Esempio:
//! ```rust
//! use asset_compressor::file_manager::{AssetFamily, FileManager};
//! use std::path::Path;
//!
//! assert_eq!(AssetFamily::from_extension("JPG"), Some(AssetFamily::RemoteRaster));
//! assert!(FileManager::is_candidate(Path::new("/tmp/logo.svg")));
//! ```

use crate::error::CompressError;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Format family of a candidate asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetFamily {
    /// png, jpg, jpeg, webp
    RemoteRaster,
    /// svg
    VectorMarkup,
    /// gif
    AnimatedRaster,
    /// svga
    AnimationContainer,
}

impl AssetFamily {
    /// Resolve a family from a bare extension (no dot), case-insensitive
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        match ext.as_str() {
            "png" | "jpg" | "jpeg" | "webp" => Some(Self::RemoteRaster),
            "svg" => Some(Self::VectorMarkup),
            "gif" => Some(Self::AnimatedRaster),
            "svga" => Some(Self::AnimationContainer),
            _ => None,
        }
    }
}

/// Manages file operations and classification
pub struct FileManager;

impl FileManager {
    /// Lowercased extension of a path, without the dot
    pub fn extension(path: &Path) -> Option<String> {
        path.extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
    }

    /// Check if a file is a compression candidate
    pub fn is_candidate(path: &Path) -> bool {
        Self::extension(path)
            .and_then(|ext| AssetFamily::from_extension(&ext))
            .is_some()
    }

    /// Output path for `source` inside `output_dir`: `stem + postfix + ext`
    pub fn postfixed_path(source: &Path, output_dir: &Path, postfix: &str) -> Result<PathBuf, CompressError> {
        let stem = source
            .file_stem()
            .ok_or_else(|| CompressError::client(format!("Invalid file name: {}", source.display())))?
            .to_string_lossy();
        let filename = match source.extension() {
            Some(ext) => format!("{}{}.{}", stem, postfix, ext.to_string_lossy()),
            None => format!("{}{}", stem, postfix),
        };
        Ok(output_dir.join(filename))
    }

    /// Size in bytes of a file
    pub async fn file_size(path: &Path) -> Result<u64, CompressError> {
        let metadata = fs::metadata(path).await.map_err(|e| {
            CompressError::io(format!("Failed to stat {}: {}", path.display(), e))
        })?;
        Ok(metadata.len())
    }

    /// Copy `from` over `to`, creating parent directories if needed
    pub async fn copy_file(from: &Path, to: &Path) -> Result<u64, CompressError> {
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                CompressError::io(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }
        fs::copy(from, to).await.map_err(|e| {
            CompressError::io(format!(
                "Failed to copy {} to {}: {}",
                from.display(),
                to.display(),
                e
            ))
        })
    }

    /// Get human-readable file size
    pub fn format_size(size: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = size as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size as u64, UNITS[unit_index])
        } else {
            format!("{:.2} {}", size, UNITS[unit_index])
        }
    }

    /// Calculate percentage reduction
    pub fn calculate_reduction(original_size: u64, new_size: u64) -> f64 {
        if original_size == 0 {
            0.0
        } else {
            ((original_size as f64 - new_size as f64) / original_size as f64) * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_resolution_is_case_insensitive() {
        assert_eq!(AssetFamily::from_extension("PNG"), Some(AssetFamily::RemoteRaster));
        assert_eq!(AssetFamily::from_extension(".Webp"), Some(AssetFamily::RemoteRaster));
        assert_eq!(AssetFamily::from_extension("svg"), Some(AssetFamily::VectorMarkup));
        assert_eq!(AssetFamily::from_extension("GIF"), Some(AssetFamily::AnimatedRaster));
        assert_eq!(AssetFamily::from_extension("svga"), Some(AssetFamily::AnimationContainer));
        assert_eq!(AssetFamily::from_extension("bmp"), None);
    }

    #[test]
    fn test_postfixed_path() {
        let out = FileManager::postfixed_path(
            Path::new("/project/assets/logo.png"),
            Path::new("/tmp/session"),
            "-min",
        )
        .unwrap();
        assert_eq!(out, PathBuf::from("/tmp/session/logo-min.png"));

        let out = FileManager::postfixed_path(Path::new("/a/b.tar.svga"), Path::new("/o"), "").unwrap();
        assert_eq!(out, PathBuf::from("/o/b.tar.svga"));
    }

    #[test]
    fn test_format_size() {
        assert_eq!(FileManager::format_size(512), "512 B");
        assert_eq!(FileManager::format_size(2048), "2.00 KB");
    }

    #[test]
    fn test_calculate_reduction() {
        assert_eq!(FileManager::calculate_reduction(0, 10), 0.0);
        assert_eq!(FileManager::calculate_reduction(200, 50), 75.0);
    }
}
