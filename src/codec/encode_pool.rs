//! # Encode Pool
//!
//! Pool di worker bloccanti per il re-encoding dei pixel (GIF, frame SVGA).
//! La dimensione deriva dal numero di CPU, divisa per 4 in build di sviluppo
//! e per 2 in release, per contenere l'uso di memoria.

use crate::error::CompressError;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct EncodePool {
    semaphore: Arc<Semaphore>,
    size: usize,
}

impl EncodePool {
    /// Pool sized from the host CPU count unless `workers` overrides it
    pub fn new(workers: Option<usize>) -> Self {
        let size = workers.unwrap_or_else(Self::default_size).max(1);
        debug!("Creating encode pool with {} workers (based on {} CPU cores)", size, num_cpus::get());
        Self {
            semaphore: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    fn default_size() -> usize {
        let divisor = if cfg!(debug_assertions) { 4 } else { 2 };
        (num_cpus::get() / divisor).max(1)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Run a CPU-bound closure on the blocking pool, at most `size` at a time
    pub async fn run<F, R>(&self, work: F) -> Result<R, CompressError>
    where
        F: FnOnce() -> Result<R, CompressError> + Send + 'static,
        R: Send + 'static,
    {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| CompressError::unknown(format!("encode pool closed: {}", e)))?;

        tokio::task::spawn_blocking(work)
            .await
            .map_err(|e| CompressError::unknown(format!("encode worker failed: {}", e)))?
    }
}

impl Default for EncodePool {
    fn default() -> Self {
        Self::new(None)
    }
}
