//! # Error Types Module
//!
//! Questo modulo definisce la tassonomia chiusa degli errori di compressione.
//!
//! ## Responsabilità:
//! - Definisce `ErrorKind`, l'insieme chiuso di categorie di errore visibili all'utente
//! - Definisce `CompressError` (kind + messaggio leggibile)
//! - Definisce `CompressFailure`, il ramo di fallimento di un job (path sorgente + errore)
//! - Conversioni automatiche da errori di I/O, immagini, protobuf e HTTP
//!
//! ## Categorie di errori:
//! - `ConfigurationError`: credenziale o impostazione mancante/non valida
//! - `ClientError`: input sorgente malformato o non supportato
//! - `ServerError`: backend remoto non disponibile o errore interno
//! - `ConnectionError`: errore di rete verso un backend remoto
//! - `ParseError`: parsing dei metadata/dimensioni fallito (nodo `disabled`)
//! - `IOError`: errore del filesystem locale
//! - `UnknownError`: tutto il resto
//!
//! ## Politica di propagazione:
//! - Nessun errore attraversa il confine del backend come panic o errore opaco
//! - Lo scheduler converte anche i panic in `UnknownError`
//!
//! ## Esempio:
//! ```rust
//! use asset_compressor::error::{CompressError, ErrorKind};
//!
//! let err = CompressError::configuration("remote optimizer credential is not set");
//! assert_eq!(err.kind, ErrorKind::Configuration);
//! assert!(err.to_string().starts_with("[ConfigurationError]"));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Closed set of error categories surfaced per job or per file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    #[serde(rename = "ConfigurationError")]
    Configuration,
    #[serde(rename = "ClientError")]
    Client,
    #[serde(rename = "ServerError")]
    Server,
    #[serde(rename = "ConnectionError")]
    Connection,
    #[serde(rename = "ParseError")]
    Parse,
    #[serde(rename = "IOError")]
    Io,
    #[serde(rename = "UnknownError")]
    Unknown,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Configuration => "ConfigurationError",
            Self::Client => "ClientError",
            Self::Server => "ServerError",
            Self::Connection => "ConnectionError",
            Self::Parse => "ParseError",
            Self::Io => "IOError",
            Self::Unknown => "UnknownError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed compression error with a human-readable message
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("[{kind}]: {message}")]
pub struct CompressError {
    pub kind: ErrorKind,
    pub message: String,
}

impl CompressError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    pub fn client(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Client, message)
    }

    pub fn server(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Server, message)
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Connection, message)
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Parse, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Io, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unknown, message)
    }
}

impl From<std::io::Error> for CompressError {
    fn from(err: std::io::Error) -> Self {
        Self::io(err.to_string())
    }
}

impl From<image::ImageError> for CompressError {
    fn from(err: image::ImageError) -> Self {
        match err {
            image::ImageError::IoError(e) => Self::io(e.to_string()),
            image::ImageError::Limits(e) => Self::client(e.to_string()),
            image::ImageError::Unsupported(e) => Self::client(e.to_string()),
            other => Self::client(other.to_string()),
        }
    }
}

impl From<prost::DecodeError> for CompressError {
    fn from(err: prost::DecodeError) -> Self {
        Self::client(format!("invalid SVGA movie entity: {}", err))
    }
}

impl From<prost::EncodeError> for CompressError {
    fn from(err: prost::EncodeError) -> Self {
        Self::unknown(format!("failed to encode SVGA movie entity: {}", err))
    }
}

impl From<reqwest::Error> for CompressError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() || err.is_request() {
            Self::connection(format!(
                "Network issue occurred. Please check your internet connectivity. ({})",
                err
            ))
        } else if err.status().map_or(false, |s| s.is_client_error()) {
            Self::client(err.to_string())
        } else {
            Self::server(err.to_string())
        }
    }
}

/// Failure branch of a backend call
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{} -> {error}", source_path.display())]
pub struct CompressFailure {
    pub source_path: PathBuf,
    pub error: CompressError,
}

impl CompressFailure {
    pub fn new(source_path: impl Into<PathBuf>, error: CompressError) -> Self {
        Self {
            source_path: source_path.into(),
            error,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.error.kind
    }

    /// Message shown on a rejected node
    pub fn message(&self) -> String {
        self.error.to_string()
    }
}

/// A job that panicked instead of settling normally
#[derive(Debug, Clone)]
pub struct TaskPanic {
    pub message: String,
}

impl From<TaskPanic> for CompressFailure {
    fn from(panic: TaskPanic) -> Self {
        Self::new(
            PathBuf::new(),
            CompressError::unknown(format!("compression task panicked: {}", panic.message)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_kind_prefix() {
        let err = CompressError::client("Check your source image and request options.");
        assert_eq!(
            err.to_string(),
            "[ClientError]: Check your source image and request options."
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: CompressError = io.into();
        assert_eq!(err.kind, ErrorKind::Io);
    }

    #[test]
    fn test_kind_serializes_with_taxonomy_name() {
        let json = serde_json::to_string(&ErrorKind::Configuration).unwrap();
        assert_eq!(json, "\"ConfigurationError\"");
    }

    #[test]
    fn test_panic_becomes_unknown_failure() {
        let failure: CompressFailure = TaskPanic {
            message: "boom".to_string(),
        }
        .into();
        assert_eq!(failure.kind(), ErrorKind::Unknown);
        assert!(failure.message().contains("boom"));
    }
}
