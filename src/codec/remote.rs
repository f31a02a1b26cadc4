//! # Remote Lossy Optimizer
//!
//! Backend per PNG/JPEG/WebP basato sul servizio remoto TinyPNG.
//!
//! ## Responsabilità:
//! - Tiene lo stato della credenziale (non validata / valida / non valida)
//! - Valida la chiave all'apertura della sessione e aggiorna il contatore d'uso
//! - Rifiuta subito con `ConfigurationError`, senza traffico di rete, se la chiave non è valida
//! - Scrive l'artefatto in modo atomico (file temporaneo + rename) nella directory di output
//!
//! ## Protocollo:
//! 1. `POST {base}/shrink` con basic auth `api:<key>` e il file come body
//! 2. URL del risultato da header `Location` (o `output.url` nel JSON)
//! 3. `GET` dell'URL del risultato
//! 4. Header `Compression-Count` = uso mensile del conto

use super::{describe_output, ensure_dir, settle, CodecBackend, CodecOptions, CompressOutput};
use crate::error::{CompressError, CompressFailure};
use async_trait::async_trait;
use serde::Deserialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

pub const DEFAULT_BASE_URL: &str = "https://api.tinify.com";

/// Result of a successful shrink call
#[derive(Debug, Clone, PartialEq)]
pub struct ShrinkResult {
    pub data: Vec<u8>,
    pub compression_count: Option<u64>,
}

/// Remote optimization service
#[async_trait]
pub trait ShrinkService: Send + Sync {
    /// Check `api_key`, returning the monthly usage when the service reports it
    async fn validate(&self, api_key: &str) -> Result<Option<u64>, CompressError>;

    /// Upload `input` and download the optimized bytes
    async fn shrink(&self, api_key: &str, input: Vec<u8>) -> Result<ShrinkResult, CompressError>;
}

#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    error: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct ShrinkBody {
    output: ShrinkBodyOutput,
}

#[derive(Debug, Deserialize)]
struct ShrinkBodyOutput {
    url: String,
}

/// HTTP implementation of [`ShrinkService`]
#[derive(Debug, Clone)]
pub struct TinifyClient {
    http: reqwest::Client,
    base_url: String,
}

impl TinifyClient {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn compression_count(response: &reqwest::Response) -> Option<u64> {
        response
            .headers()
            .get("compression-count")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
    }

    async fn error_from(response: reqwest::Response) -> CompressError {
        let status = response.status();
        let body: ApiErrorBody = response.json().await.unwrap_or_default();
        error_for_status(status.as_u16(), &body.error, &body.message)
    }
}

impl Default for TinifyClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Map a non-success HTTP status onto the error taxonomy
pub fn error_for_status(status: u16, error: &str, message: &str) -> CompressError {
    let detail = match (error.is_empty(), message.is_empty()) {
        (true, true) => format!("HTTP {}", status),
        (false, true) => format!("{} (HTTP {})", error, status),
        (true, false) => format!("{} (HTTP {})", message, status),
        (false, false) => format!("{}: {} (HTTP {})", error, message, status),
    };
    match status {
        401 | 429 => CompressError::configuration(detail),
        400..=499 => CompressError::client(detail),
        500..=599 => CompressError::server(detail),
        _ => CompressError::unknown(detail),
    }
}

#[async_trait]
impl ShrinkService for TinifyClient {
    async fn validate(&self, api_key: &str) -> Result<Option<u64>, CompressError> {
        let response = self
            .http
            .post(format!("{}/shrink", self.base_url))
            .basic_auth("api", Some(api_key))
            .send()
            .await?;

        let count = Self::compression_count(&response);
        match response.status().as_u16() {
            // An empty upload is rejected as a bad request once the key is accepted
            200..=299 | 400 | 429 => Ok(count),
            _ => Err(Self::error_from(response).await),
        }
    }

    async fn shrink(&self, api_key: &str, input: Vec<u8>) -> Result<ShrinkResult, CompressError> {
        let response = self
            .http
            .post(format!("{}/shrink", self.base_url))
            .basic_auth("api", Some(api_key))
            .body(input)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        let compression_count = Self::compression_count(&response);
        let location = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let url = match location {
            Some(url) => url,
            None => {
                let body: ShrinkBody = response
                    .json()
                    .await
                    .map_err(|e| CompressError::server(format!("unexpected shrink response: {}", e)))?;
                body.output.url
            }
        };
        debug!("Downloading optimized output from {}", url);

        let download = self
            .http
            .get(&url)
            .basic_auth("api", Some(api_key))
            .send()
            .await?;
        if !download.status().is_success() {
            return Err(Self::error_from(download).await);
        }
        let data = download.bytes().await?.to_vec();

        Ok(ShrinkResult {
            data,
            compression_count,
        })
    }
}

/// Credential lifecycle within one process
#[derive(Debug, Clone, PartialEq)]
pub enum CredentialState {
    Unvalidated,
    Valid { api_key: String },
    Invalid { api_key: String, reason: String },
}

/// Backend for PNG/JPEG/WebP
pub struct RemoteOptimizer {
    service: Arc<dyn ShrinkService>,
    credential: RwLock<CredentialState>,
    usage: AtomicU64,
}

impl RemoteOptimizer {
    pub fn new(service: Arc<dyn ShrinkService>) -> Self {
        Self {
            service,
            credential: RwLock::new(CredentialState::Unvalidated),
            usage: AtomicU64::new(0),
        }
    }

    pub fn credential(&self) -> CredentialState {
        match self.credential.read() {
            Ok(state) => state.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn set_credential(&self, state: CredentialState) {
        match self.credential.write() {
            Ok(mut guard) => *guard = state,
            Err(poisoned) => *poisoned.into_inner() = state,
        }
    }

    /// Monthly usage last reported by the service
    pub fn usage(&self) -> u64 {
        self.usage.load(Ordering::Relaxed)
    }

    fn record_usage(&self, count: Option<u64>) {
        if let Some(count) = count {
            self.usage.store(count, Ordering::Relaxed);
        }
    }

    /// Validate `api_key` and remember the outcome; an empty key never reaches the network
    pub async fn validate_credential(&self, api_key: &str) -> Result<u64, CompressError> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            let reason = "remote optimizer API key is not configured".to_string();
            warn!("{}", reason);
            self.set_credential(CredentialState::Invalid {
                api_key: String::new(),
                reason: reason.clone(),
            });
            return Err(CompressError::configuration(reason));
        }

        match self.service.validate(api_key).await {
            Ok(count) => {
                self.record_usage(count);
                info!("Remote optimizer credential accepted (usage this month: {})", self.usage());
                self.set_credential(CredentialState::Valid {
                    api_key: api_key.to_string(),
                });
                Ok(self.usage())
            }
            Err(e) => {
                warn!("Remote optimizer credential rejected: {}", e);
                self.set_credential(CredentialState::Invalid {
                    api_key: api_key.to_string(),
                    reason: e.message.clone(),
                });
                Err(CompressError::configuration(e.message))
            }
        }
    }

    /// Re-validate only when `api_key` differs from the key behind the current state
    pub async fn refresh_credential(&self, api_key: &str) -> Result<u64, CompressError> {
        let api_key = api_key.trim();
        match self.credential() {
            CredentialState::Valid { api_key: checked } if checked == api_key => Ok(self.usage()),
            CredentialState::Invalid { api_key: checked, reason } if checked == api_key => {
                Err(CompressError::configuration(reason))
            }
            _ => {
                debug!("Remote optimizer credential changed, validating again");
                self.validate_credential(api_key).await
            }
        }
    }

    async fn run(&self, source: &Path, output_dir: &Path, options: &CodecOptions) -> Result<CompressOutput, CompressError> {
        let api_key = match self.credential() {
            CredentialState::Valid { api_key } => api_key,
            CredentialState::Unvalidated => {
                return Err(CompressError::configuration(
                    "remote optimizer credential has not been validated; set tinypng_api_key",
                ))
            }
            CredentialState::Invalid { reason, .. } => {
                return Err(CompressError::configuration(format!(
                    "remote optimizer credential is invalid: {}",
                    reason
                )))
            }
        };

        let input = tokio::fs::read(source).await?;
        let result = self.service.shrink(&api_key, input).await?;
        self.record_usage(result.compression_count);

        ensure_dir(output_dir).await?;
        let output_path = options.output_path(source, output_dir)?;
        write_atomically(output_dir.to_path_buf(), output_path.clone(), result.data).await?;

        describe_output(source, output_path).await
    }
}

/// Write through a temp file in `dir` then rename onto `target`
async fn write_atomically(dir: PathBuf, target: PathBuf, data: Vec<u8>) -> Result<(), CompressError> {
    tokio::task::spawn_blocking(move || {
        let mut temp = tempfile::NamedTempFile::new_in(&dir)?;
        temp.write_all(&data)?;
        temp.as_file().sync_all()?;
        temp.persist(&target).map_err(|e| CompressError::io(e.to_string()))?;
        Ok(())
    })
    .await
    .map_err(|e| CompressError::unknown(e.to_string()))?
}

#[async_trait]
impl CodecBackend for RemoteOptimizer {
    fn name(&self) -> &'static str {
        "remote"
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
