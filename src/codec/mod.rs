//! # Codec Backends Module
//!
//! Contratto comune dei backend di compressione e le quattro implementazioni.
//!
//! ## Responsabilità:
//! - Definisce il trait `CodecBackend` (`compress(source, output_dir)`)
//! - Definisce il ramo di successo `CompressOutput`
//! - Applica in modo uniforme il nome di output `stem + postfix + ext`
//! - Converte ogni errore interno in un `CompressFailure` tipizzato al confine del backend
//!
//! ## Backend:
//! - `remote`: ottimizzatore lossy remoto a quota (PNG/JPEG/WebP)
//! - `vector`: ottimizzatore markup vettoriale locale (SVG, tool esterni)
//! - `raster`: re-encoder raster animato (GIF, palette ridotta)
//! - `container`: re-encoder del container SVGA (frame PNG embedded)
//! - `encode_pool`: pool di worker bloccanti per il re-encoding dei pixel
//! - `palette`: palette adattiva NeuQuant usata da `raster` e `container`
//!
//! ## Regole condivise:
//! - Il file di output è già scritto e verificato (stat) quando il backend ritorna
//! - Dimensione e dimensioni riflettono l'artefatto reale, non una stima

pub mod container;
pub mod encode_pool;
pub mod palette;
pub mod raster;
pub mod remote;
pub mod vector;

pub use container::SvgaReencoder;
pub use encode_pool::EncodePool;
pub use raster::GifReencoder;
pub use remote::{RemoteOptimizer, ShrinkService, TinifyClient};
pub use vector::SvgOptimizer;

use crate::error::{CompressError, CompressFailure};
use crate::file_manager::FileManager;
use crate::metadata::{self, Dimensions};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, error};

/// Per-command options shared by every backend
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CodecOptions {
    /// Inserted between stem and extension of the output file
    pub postfix: String,
    /// Palette size for GIF re-encoding
    pub gif_colors: u16,
}

impl CodecOptions {
    pub fn output_path(&self, source: &Path, output_dir: &Path) -> Result<PathBuf, CompressError> {
        FileManager::postfixed_path(source, output_dir, &self.postfix)
    }
}

/// Success branch of a backend call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressOutput {
    pub source_path: PathBuf,
    pub output_path: PathBuf,
    pub output_size: u64,
    pub output_dimensions: Dimensions,
}

/// One compression implementation for a format family
#[async_trait]
pub trait CodecBackend: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Compress `source` into `output_dir`
    async fn compress(
        &self,
        source: &Path,
        output_dir: &Path,
        options: &CodecOptions,
    ) -> Result<CompressOutput, CompressFailure>;
}

/// Wrap a backend's internal result into the typed failure branch
pub(crate) fn settle(
    backend: &str,
    source: &Path,
    result: Result<CompressOutput, CompressError>,
) -> Result<CompressOutput, CompressFailure> {
    match result {
        Ok(output) => {
            debug!(
                "[{}] {} -> {} ({})",
                backend,
                source.display(),
                output.output_path.display(),
                FileManager::format_size(output.output_size)
            );
            Ok(output)
        }
        Err(e) => {
            error!("[{}] compression failed for {}: {}", backend, source.display(), e);
            Err(CompressFailure::new(source, e))
        }
    }
}

/// Stat and measure a freshly written artifact
pub(crate) async fn describe_output(source: &Path, output_path: PathBuf) -> Result<CompressOutput, CompressError> {
    let output_size = FileManager::file_size(&output_path).await?;
    let output_dimensions = metadata::read_dimensions(&output_path).await.map_err(|e| {
        CompressError::client(format!(
            "optimized artifact {} is unreadable: {}",
            output_path.display(),
            e.message
        ))
    })?;
    Ok(CompressOutput {
        source_path: source.to_path_buf(),
        output_path,
        output_size,
        output_dimensions,
    })
}

/// Create `output_dir` if it does not exist yet
pub(crate) async fn ensure_dir(output_dir: &Path) -> Result<(), CompressError> {
    tokio::fs::create_dir_all(output_dir).await.map_err(|e| {
        CompressError::io(format!("Failed to create {}: {}", output_dir.display(), e))
    })
}

/// Run an external optimizer, mapping a non-zero exit to `ClientError`
pub(crate) async fn run_tool(
    tool: &str,
    program: &Path,
    args: &[std::ffi::OsString],
) -> Result<(), CompressError> {
    debug!("Running {} {:?}", tool, args);
    let output = tokio::process::Command::new(program)
        .args(args)
        .output()
        .await
        .map_err(|e| CompressError::io(format!("Failed to execute {}: {}", tool, e)))?;

    if output.status.success() {
        Ok(())
    } else {
        Err(CompressError::client(format!(
            "{} exited with {}: {}",
            tool,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )))
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_path_uses_postfix_uniformly() {
        let options = CodecOptions {
            postfix: ".min".to_string(),
            gif_colors: 10,
        };
        let out = options
            .output_path(Path::new("/src/anim.svga"), Path::new("/tmp/s1"))
            .unwrap();
        assert_eq!(out, PathBuf::from("/tmp/s1/anim.min.svga"));
    }

    #[test]
    fn test_settle_wraps_error_with_source() {
        let failure = settle(
            "test",
            Path::new("/a.png"),
            Err(CompressError::server("down")),
        )
        .unwrap_err();
        assert_eq!(failure.source_path, PathBuf::from("/a.png"));
        assert_eq!(failure.kind(), crate::error::ErrorKind::Server);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_tool_maps_exit_code() {
        let err = run_tool("false", Path::new("/bin/sh"), &["-c".into(), "echo nope >&2; exit 3".into()])
            .await
            .unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Client);
        assert!(err.message.contains("nope"));
    }
}
