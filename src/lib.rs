//! # Asset Compressor Library
//!
//! Questo è il modulo principale della libreria che espone tutte le API pubbliche.
//!
//! ## Responsabilità:
//! - Definisce la struttura modulare dell'applicazione
//! - Espone i tipi e le funzioni principali tramite re-exports
//! - Fornisce un'interfaccia pulita per il main.rs e per altri host
//!
//! ## Architettura dei moduli:
//! - `config`: Gestione configurazione, validazione e `ConfigProvider`
//! - `error`: Tassonomia degli errori (`ErrorKind`, `CompressError`, `CompressFailure`)
//! - `file_manager`: Classificazione estensioni, path con postfix, copie
//! - `metadata` / `svga`: Dimensioni sorgente/ottimizzate e container SVGA
//! - `codec`: Trait `CodecBackend` e i backend remote/vector/raster/container
//! - `dispatcher`: Sceglie il backend per estensione e produce un `Job`
//! - `scheduler`: Esecuzione con tetto di concorrenza
//! - `workspace` / `scanner`: Albero dei file e macchina a stati per nodo
//! - `session` / `save`: Directory temporanee per sessione e promozione degli artefatti
//! - `compressor`: Il servizio `ImageCompressor` che collega tutto
//! - `ipc`: Messaggi `{signal, payload}` e `EventSink`
//! - `progress`: Progress bar e statistiche
//!
//! ## Utilizzo:
//! ```rust,ignore
//! use asset_compressor::{Config, ConfigProvider, ImageCompressor, TinifyClient};
//! use asset_compressor::ipc::JsonLinesSink;
//! use std::sync::Arc;
//!
//! let compressor = ImageCompressor::new(
//!     ConfigProvider::fixed(Config::default()),
//!     Arc::new(TinifyClient::new()),
//!     Arc::new(JsonLinesSink),
//! );
//! let session = compressor.open_session(&[path], None).await?;
//! let keys = compressor.snapshot(session).await?.selectable_keys();
//! compressor.compress_selected(session, &keys).await?;
//! compressor.close_session(session).await;
//! ```

pub mod codec;
pub mod compressor;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod file_manager;
pub mod ipc;
pub mod metadata;
pub mod platform;
pub mod progress;
pub mod save;
pub mod scanner;
pub mod scheduler;
pub mod session;
pub mod svga;
pub mod tool_resolver;
pub mod utils;
pub mod workspace;

pub use codec::{CodecBackend, CodecOptions, CompressOutput, TinifyClient};
pub use compressor::ImageCompressor;
pub use config::{Config, ConfigOverrides, ConfigProvider};
pub use dispatcher::{CompressionDispatcher, Job, JobOutcome};
pub use error::{CompressError, CompressFailure, ErrorKind};
pub use scheduler::TaskScheduler;
pub use session::{SessionId, SessionStore};
pub use save::SaveCoordinator;
pub use tool_resolver::ToolPathResolver;
pub use workspace::{CompressedState, Workspace, WorkspaceNode};
