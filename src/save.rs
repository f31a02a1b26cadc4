//! # Save Coordinator
//!
//! Promuove gli artefatti ottimizzati dalla session store verso le sorgenti.
//!
//! ## Regole:
//! - `overwrite = true`: destinazione = path sorgente (sostituzione in place)
//! - `overwrite = false`: destinazione = directory della sorgente + nome del file
//!   temporaneo (nome con postfix), l'originale resta intatto
//! - Tutte le copie di una richiesta partono in parallelo e sono indipendenti:
//!   un fallimento non blocca né fa fallire le altre
//! - L'esito è riportato per file; la variante "file corrente" usa un envelope

use crate::error::CompressError;
use crate::file_manager::FileManager;
use crate::ipc::{Envelope, Status};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, error};

/// One accepted artifact to promote
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRequest {
    pub key: String,
    pub source_path: PathBuf,
    pub temp_path: PathBuf,
}

/// Per-file result of a save
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveOutcome {
    pub key: String,
    pub status: Status,
    pub overwrite: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<CompressError>,
}

impl SaveOutcome {
    pub fn is_fulfilled(&self) -> bool {
        self.status == Status::Fulfilled
    }
}

pub struct SaveCoordinator;

impl SaveCoordinator {
    /// Where `request` lands under the given overwrite policy
    pub fn destination(request: &SaveRequest, overwrite: bool) -> Result<PathBuf, CompressError> {
        if overwrite {
            return Ok(request.source_path.clone());
        }
        let dir = request.source_path.parent().ok_or_else(|| {
            CompressError::client(format!("{} has no parent directory", request.source_path.display()))
        })?;
        let name = request.temp_path.file_name().ok_or_else(|| {
            CompressError::client(format!("invalid artifact path {}", request.temp_path.display()))
        })?;
        Ok(dir.join(name))
    }

    async fn save_one(request: &SaveRequest, overwrite: bool) -> SaveOutcome {
        let result = async {
            let destination = Self::destination(request, overwrite)?;
            copy_artifact(&request.temp_path, &destination).await?;
            Ok::<PathBuf, CompressError>(destination)
        }
        .await;

        match result {
            Ok(destination) => {
                debug!("Saved {} -> {}", request.key, destination.display());
                SaveOutcome {
                    key: request.key.clone(),
                    status: Status::Fulfilled,
                    overwrite,
                    destination: Some(destination),
                    error: None,
                }
            }
            Err(e) => {
                error!("Failed to save {}: {}", request.key, e);
                SaveOutcome {
                    key: request.key.clone(),
                    status: Status::Rejected,
                    overwrite,
                    destination: None,
                    error: Some(e),
                }
            }
        }
    }

    /// Copy every artifact concurrently; outcomes follow the order of `files`
    pub async fn save(files: &[SaveRequest], overwrite: bool) -> Vec<SaveOutcome> {
        join_all(files.iter().map(|file| Self::save_one(file, overwrite))).await
    }

    /// Single-file variant wrapped in an envelope
    pub async fn save_current(file: &SaveRequest, overwrite: bool) -> Envelope {
        let outcome = Self::save_one(file, overwrite).await;
        match &outcome.error {
            None => Envelope::fulfilled(&outcome),
            Some(e) => Envelope::rejected_with(&outcome, e.to_string()),
        }
    }
}

async fn copy_artifact(from: &Path, to: &Path) -> Result<u64, CompressError> {
    if from == to {
        return FileManager::file_size(to).await;
    }
    FileManager::copy_file(from, to).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::TempDir;

    fn request(temp: &TempDir, name: &str, postfix: &str) -> SaveRequest {
        let src_dir = temp.path().join("assets");
        let store = temp.path().join(".mikas").join("s1");
        std::fs::create_dir_all(&src_dir).unwrap();
        std::fs::create_dir_all(&store).unwrap();

        let source = src_dir.join(name);
        std::fs::write(&source, b"original bytes").unwrap();
        let temp_path = FileManager::postfixed_path(&source, &store, postfix).unwrap();
        std::fs::write(&temp_path, b"opt").unwrap();

        SaveRequest {
            key: source.to_string_lossy().into_owned(),
            source_path: source,
            temp_path,
        }
    }

    #[test]
    fn test_destination_policy() {
        let req = SaveRequest {
            key: "/w/img/a.png".to_string(),
            source_path: PathBuf::from("/w/img/a.png"),
            temp_path: PathBuf::from("/w/.mikas/s1/a-min.png"),
        };
        assert_eq!(SaveCoordinator::destination(&req, true).unwrap(), PathBuf::from("/w/img/a.png"));
        assert_eq!(
            SaveCoordinator::destination(&req, false).unwrap(),
            PathBuf::from("/w/img/a-min.png")
        );
    }

    /// Five files saved next to their sources
    #[tokio::test]
    async fn test_save_five_siblings_without_overwrite() {
        let temp = TempDir::new().unwrap();
        let names = ["a.png", "b.jpg", "c.svg", "d.gif", "e.svga"];
        let files: Vec<_> = names.iter().map(|n| request(&temp, n, ".min")).collect();

        let outcomes = SaveCoordinator::save(&files, false).await;
        assert_eq!(outcomes.len(), 5);
        for (file, outcome) in files.iter().zip(&outcomes) {
            assert_eq!(outcome.key, file.key);
            assert_eq!(outcome.status, Status::Fulfilled);
            let stem = file.source_path.file_stem().unwrap().to_string_lossy();
            let ext = file.source_path.extension().unwrap().to_string_lossy();
            let sibling = file.source_path.with_file_name(format!("{}.min.{}", stem, ext));
            assert_eq!(outcome.destination.as_deref(), Some(sibling.as_path()));
            assert_eq!(std::fs::read(&sibling).unwrap(), b"opt");
            assert_eq!(std::fs::read(&file.source_path).unwrap(), b"original bytes");
        }
    }

    #[tokio::test]
    async fn test_overwrite_replaces_source() {
        let temp = TempDir::new().unwrap();
        let file = request(&temp, "a.png", "");
        let outcomes = SaveCoordinator::save(std::slice::from_ref(&file), true).await;
        assert!(outcomes[0].is_fulfilled());
        assert!(outcomes[0].overwrite);
        assert_eq!(std::fs::read(&file.source_path).unwrap(), b"opt");
    }

    #[tokio::test]
    async fn test_one_failure_does_not_block_others() {
        let temp = TempDir::new().unwrap();
        let good = request(&temp, "a.png", "-x");
        let mut missing = request(&temp, "b.png", "-x");
        std::fs::remove_file(&missing.temp_path).unwrap();
        missing.key = "missing".to_string();

        let outcomes = SaveCoordinator::save(&[missing, good.clone()], false).await;
        assert_eq!(outcomes[0].status, Status::Rejected);
        assert_eq!(outcomes[0].error.as_ref().unwrap().kind, ErrorKind::Io);
        assert_eq!(outcomes[1].status, Status::Fulfilled);
    }

    #[tokio::test]
    async fn test_save_current_envelope() {
        let temp = TempDir::new().unwrap();
        let file = request(&temp, "a.png", "-x");
        let envelope = SaveCoordinator::save_current(&file, false).await;
        assert!(envelope.is_fulfilled());
        assert_eq!(envelope.data["key"], file.key.as_str());

        std::fs::remove_file(&file.temp_path).unwrap();
        let envelope = SaveCoordinator::save_current(&file, false).await;
        assert_eq!(envelope.status, Status::Rejected);
        assert!(envelope.error.unwrap().starts_with("[IOError]"));
    }
}
