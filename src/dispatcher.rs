//! # Compression Dispatcher
//!
//! Associa l'estensione di un file al backend di compressione corretto e
//! costruisce il `Job` corrispondente.
//!
//! ## Precedenza (case-insensitive):
//! 1. `png`, `jpg`, `jpeg`, `webp` → ottimizzatore lossy remoto
//! 2. `svg` → ottimizzatore markup vettoriale
//! 3. `gif` → re-encoder raster animato
//! 4. `svga` → re-encoder del container
//! 5. qualsiasi altra estensione → job no-op (successo senza artefatto)
//!
//! La risoluzione è una funzione pura dell'estensione: nessun I/O.

use crate::codec::{CodecBackend, CodecOptions, CompressOutput};
use crate::error::CompressFailure;
use crate::file_manager::AssetFamily;
use crate::workspace::FileDescriptor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// One backend per format family
#[derive(Clone)]
pub struct Backends {
    pub remote: Arc<dyn CodecBackend>,
    pub vector: Arc<dyn CodecBackend>,
    pub raster: Arc<dyn CodecBackend>,
    pub container: Arc<dyn CodecBackend>,
}

impl Backends {
    pub fn for_family(&self, family: AssetFamily) -> Arc<dyn CodecBackend> {
        match family {
            AssetFamily::RemoteRaster => self.remote.clone(),
            AssetFamily::VectorMarkup => self.vector.clone(),
            AssetFamily::AnimatedRaster => self.raster.clone(),
            AssetFamily::AnimationContainer => self.container.clone(),
        }
    }
}

/// Settlement of a job that ran to completion
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Compressed(CompressOutput),
    /// Unsupported extension; nothing was written
    Skipped { source_path: PathBuf },
}

/// Ephemeral unit of work bound to one scheduler run
pub struct Job {
    pub key: String,
    pub source_path: PathBuf,
    pub target_dir: PathBuf,
    backend: Option<Arc<dyn CodecBackend>>,
    options: Arc<CodecOptions>,
}

impl Job {
    pub fn is_noop(&self) -> bool {
        self.backend.is_none()
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.as_ref().map_or("noop", |b| b.name())
    }

    pub async fn execute(self) -> Result<JobOutcome, CompressFailure> {
        match self.backend {
            Some(backend) => backend
                .compress(&self.source_path, &self.target_dir, &self.options)
                .await
                .map(JobOutcome::Compressed),
            None => Ok(JobOutcome::Skipped {
                source_path: self.source_path,
            }),
        }
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("key", &self.key)
            .field("backend", &self.backend_name())
            .field("target_dir", &self.target_dir)
            .finish()
    }
}

pub struct CompressionDispatcher {
    backends: Backends,
    options: Arc<CodecOptions>,
    target_dir: PathBuf,
}

impl CompressionDispatcher {
    /// Dispatcher writing every job's output into `target_dir`
    pub fn new(backends: Backends, options: CodecOptions, target_dir: impl Into<PathBuf>) -> Self {
        Self {
            backends,
            options: Arc::new(options),
            target_dir: target_dir.into(),
        }
    }

    /// Family handling `extension`, or `None` for a no-op
    pub fn resolve(extension: &str) -> Option<AssetFamily> {
        AssetFamily::from_extension(extension)
    }

    pub fn target_dir(&self) -> &Path {
        &self.target_dir
    }

    pub fn dispatch(&self, file: &FileDescriptor) -> Job {
        let backend = Self::resolve(&file.extension).map(|family| self.backends.for_family(family));
        let job = Job {
            key: file.key.clone(),
            source_path: file.source_path().to_path_buf(),
            target_dir: self.target_dir.clone(),
            backend,
            options: self.options.clone(),
        };
        debug!("Dispatched {} to {}", file.key, job.backend_name());
        job
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::codec::testing::SleepyBackend;

    /// Every family served by the same backend
    pub fn uniform(backend: Arc<SleepyBackend>) -> Backends {
        Backends {
            remote: backend.clone(),
            vector: backend.clone(),
            raster: backend.clone(),
            container: backend,
        }
    }
}
