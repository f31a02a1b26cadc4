//! # Configuration Management Module
//!
//! Questo modulo gestisce tutta la configurazione dell'applicazione.
//!
//! ## Responsabilità:
//! - Definisce la struct `Config` con tutti i parametri di compressione
//! - Fornisce validazione dei parametri di input
//! - Supporta caricamento/salvataggio configurazione da/verso file JSON
//! - Fornisce `ConfigProvider`, che produce uno snapshot fresco per ogni comando
//!
//! ## Parametri di configurazione:
//! - `ignore`: Pattern glob separati da `;` (spazi rimossi, segmenti vuoti scartati)
//! - `tinypng_api_key`: Credenziale dell'ottimizzatore remoto (default: vuota)
//! - `compressed_file_postfix`: Postfix tra stem ed estensione (default: "")
//! - `concurrency`: Tetto di concorrenza dello scheduler (default: 6)
//! - `force_overwrite`: Sovrascrive i sorgenti al salvataggio (default: false)
//! - `temp_root_name`: Nome della directory temporanea radice (default: ".mikas")
//! - `gif_colors`: Dimensione palette del re-encoder GIF (default: 10)
//! - `encode_workers`: Override della dimensione del pool di encoding locale
//!
//! ## Validazione:
//! - `concurrency` deve essere > 0
//! - `gif_colors` deve essere 2-256
//!
//! ## Esempio:
//! ```rust
//! use asset_compressor::Config;
//!
//! let config = Config {
//!     concurrency: 3,
//!     compressed_file_postfix: "-min".to_string(),
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEFAULT_CONCURRENCY: usize = 6;
pub const DEFAULT_IGNORE: &str = "**/node_modules/**;**/.git/**;**/.mikas/**";

/// Configuration for asset compression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Semicolon-separated ignore globs
    pub ignore: String,
    /// Remote optimizer credential
    pub tinypng_api_key: String,
    /// Inserted between source stem and extension
    pub compressed_file_postfix: String,
    /// Maximum number of in-flight compression jobs
    pub concurrency: usize,
    /// Save over the source instead of next to it
    pub force_overwrite: bool,
    /// Directory created under the first workspace root to hold session stores
    pub temp_root_name: String,
    /// Palette size used by the GIF re-encoder
    pub gif_colors: u16,
    /// Local encode pool size (None = derived from CPU count)
    pub encode_workers: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ignore: DEFAULT_IGNORE.to_string(),
            tinypng_api_key: String::new(),
            compressed_file_postfix: String::new(),
            concurrency: DEFAULT_CONCURRENCY,
            force_overwrite: false,
            temp_root_name: ".mikas".to_string(),
            gif_colors: 10,
            encode_workers: None,
        }
    }
}

impl Config {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(anyhow::anyhow!("Concurrency must be greater than 0"));
        }

        if !(2..=256).contains(&self.gif_colors) {
            return Err(anyhow::anyhow!("GIF palette size must be between 2 and 256"));
        }

        if let Some(0) = self.encode_workers {
            return Err(anyhow::anyhow!("Number of encode workers must be greater than 0"));
        }

        if self.temp_root_name.trim().is_empty() || self.temp_root_name.contains(['/', '\\']) {
            return Err(anyhow::anyhow!(
                "Temp root name must be a single non-empty path segment: {:?}",
                self.temp_root_name
            ));
        }

        Ok(())
    }

    /// Ignore globs, whitespace stripped and empty segments dropped
    pub fn ignore_patterns(&self) -> Vec<String> {
        self.ignore
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .split(';')
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Load configuration from file
    pub async fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    /// Default location of the user config file (`~/.asset-compressor/config.json`)
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".asset-compressor").join("config.json"))
    }
}

/// Values given on the command line that win over the config file
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub ignore: Option<String>,
    pub tinypng_api_key: Option<String>,
    pub compressed_file_postfix: Option<String>,
    pub concurrency: Option<usize>,
    pub force_overwrite: Option<bool>,
    pub gif_colors: Option<u16>,
    pub encode_workers: Option<usize>,
}

impl ConfigOverrides {
    fn apply(&self, config: &mut Config) {
        if let Some(ref ignore) = self.ignore {
            config.ignore = ignore.clone();
        }
        if let Some(ref key) = self.tinypng_api_key {
            config.tinypng_api_key = key.clone();
        }
        if let Some(ref postfix) = self.compressed_file_postfix {
            config.compressed_file_postfix = postfix.clone();
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(overwrite) = self.force_overwrite {
            config.force_overwrite = overwrite;
        }
        if let Some(colors) = self.gif_colors {
            config.gif_colors = colors;
        }
        if let Some(workers) = self.encode_workers {
            config.encode_workers = Some(workers);
        }
    }
}

/// Produces a fresh `Config` on every command invocation
#[derive(Debug, Clone, Default)]
pub struct ConfigProvider {
    path: Option<PathBuf>,
    base: Config,
    overrides: ConfigOverrides,
}

impl ConfigProvider {
    /// Provider backed by a fixed configuration
    pub fn fixed(config: Config) -> Self {
        Self {
            path: None,
            base: config,
            overrides: ConfigOverrides::default(),
        }
    }

    /// Provider re-reading `path` on every snapshot, with CLI overrides on top
    pub fn from_file(path: PathBuf, overrides: ConfigOverrides) -> Self {
        Self {
            path: Some(path),
            base: Config::default(),
            overrides,
        }
    }

    /// Current configuration
    pub async fn snapshot(&self) -> Result<Config> {
        let mut config = match self.path {
            Some(ref path) => {
                debug!("Reading configuration from {}", path.display());
                Config::from_file(path).await?
            }
            None => self.base.clone(),
        };
        self.overrides.apply(&mut config);
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.concurrency = 0;
        assert!(config.validate().is_err());

        config.concurrency = 6;
        config.gif_colors = 1;
        assert!(config.validate().is_err());

        config.gif_colors = 10;
        config.temp_root_name = "a/b".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.concurrency, 6);
        assert_eq!(config.compressed_file_postfix, "");
        assert!(!config.force_overwrite);
        assert!(config.tinypng_api_key.is_empty());
        assert_eq!(config.gif_colors, 10);
    }

    #[test]
    fn test_ignore_patterns_split() {
        let config = Config {
            ignore: " **/dist/** ; ;**/*.min.svg;".to_string(),
            ..Default::default()
        };
        assert_eq!(config.ignore_patterns(), vec!["**/dist/**", "**/*.min.svg"]);
    }

    #[tokio::test]
    async fn test_config_save_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");

        let original_config = Config {
            tinypng_api_key: "secret".to_string(),
            compressed_file_postfix: "-min".to_string(),
            concurrency: 2,
            force_overwrite: true,
            ..Default::default()
        };

        original_config.save_to_file(&config_path).await.unwrap();
        let loaded_config = Config::from_file(&config_path).await.unwrap();

        assert_eq!(loaded_config, original_config);
    }

    #[tokio::test]
    async fn test_provider_rereads_file_per_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        let provider = ConfigProvider::from_file(
            config_path.clone(),
            ConfigOverrides {
                concurrency: Some(2),
                ..Default::default()
            },
        );

        let first = provider.snapshot().await.unwrap();
        assert_eq!(first.concurrency, 2);
        assert_eq!(first.compressed_file_postfix, "");

        Config {
            compressed_file_postfix: "-tiny".to_string(),
            ..Default::default()
        }
        .save_to_file(&config_path)
        .await
        .unwrap();

        let second = provider.snapshot().await.unwrap();
        assert_eq!(second.compressed_file_postfix, "-tiny");
        assert_eq!(second.concurrency, 2);
    }
}
