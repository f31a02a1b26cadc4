//! # Asset Compressor - Main Entry Point
//!
//! Questo è il punto di ingresso principale dell'applicazione: fa da host
//! (presentation layer) per il servizio `ImageCompressor`.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap`
//! - Inizializzazione del sistema di logging con `tracing` (`RUST_LOG` rispettato)
//! - Costruzione del `ConfigProvider` (file JSON + override da CLI)
//! - Apertura della sessione, compressione, salvataggio opzionale e teardown
//!
//! ## Modalità:
//! 1. Batch (default): comprime tutte le foglie selezionabili (o solo `--only`),
//!    salva con `--save`, stampa il riepilogo
//! 2. `--stdio`: legge comandi `webview.*` come righe JSON da stdin fino a EOF
//!
//! Con `--json` gli eventi `extension.*` vanno su stdout, uno per riga, e i log su stderr.
//!
//! ## Esempio di utilizzo:
//! ```bash
//! asset-compressor ./assets --postfix .min --concurrency 4 --save --verbose
//! ```

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncBufReadExt;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use asset_compressor::compressor::absolute_roots;
use asset_compressor::ipc::{Command, EventSink, JsonLinesSink};
use asset_compressor::platform::PlatformCommands;
use asset_compressor::progress::{ProgressManager, ProgressSink};
use asset_compressor::{
    Config, ConfigOverrides, ConfigProvider, ImageCompressor, SessionId, TinifyClient, ToolPathResolver,
};

#[derive(Parser)]
#[command(name = "asset-compressor")]
#[command(about = "Compress png/jpg/webp/svg/gif/svga assets in place or next to their sources")]
struct Args {
    /// Files or directories forming the workspace
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Config file (default: ~/.asset-compressor/config.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the effective configuration to the config file and exit
    #[arg(long)]
    write_config: bool,

    /// Remote optimizer API key
    #[arg(long, env = "TINYPNG_API_KEY")]
    api_key: Option<String>,

    /// Base URL of the remote optimizer
    #[arg(long)]
    remote_url: Option<String>,

    /// Postfix inserted between file stem and extension
    #[arg(short, long)]
    postfix: Option<String>,

    /// Maximum number of concurrent compression jobs
    #[arg(short, long)]
    concurrency: Option<usize>,

    /// Replace the sources when saving
    #[arg(long)]
    overwrite: bool,

    /// Semicolon-separated ignore globs
    #[arg(long)]
    ignore: Option<String>,

    /// Palette size of the GIF re-encoder (2-256)
    #[arg(long)]
    gif_colors: Option<u16>,

    /// Size of the local encode pool
    #[arg(long)]
    encode_workers: Option<usize>,

    /// Compress only these files
    #[arg(long)]
    only: Vec<PathBuf>,

    /// Save every compressed file after the batch
    #[arg(short, long)]
    save: bool,

    /// Emit IPC events as JSON lines on stdout
    #[arg(long)]
    json: bool,

    /// Read commands as JSON lines from stdin instead of running a batch
    #[arg(long)]
    stdio: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            ignore: self.ignore.clone(),
            tinypng_api_key: self.api_key.clone(),
            compressed_file_postfix: self.postfix.clone(),
            concurrency: self.concurrency,
            force_overwrite: self.overwrite.then_some(true),
            gif_colors: self.gif_colors,
            encode_workers: self.encode_workers,
        }
    }
}

async fn run_batch(compressor: &ImageCompressor, session: SessionId, args: &Args, progress: &ProgressManager) -> Result<()> {
    let keys = if args.only.is_empty() {
        compressor.snapshot(session).await?.selectable_keys()
    } else {
        absolute_roots(&args.only)?
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect()
    };
    progress.set_length(keys.len() as u64);

    let report = compressor.compress_selected(session, &keys).await?;

    if args.save {
        let fulfilled = compressor.snapshot(session).await?.fulfilled_keys();
        let outcomes = compressor.save_selected(session, &fulfilled).await?;
        for outcome in outcomes.iter().filter(|o| !o.is_fulfilled()) {
            if let Some(e) = &outcome.error {
                warn!("Could not save {}: {}", outcome.key, e);
            }
        }
    }

    progress.finish(&report.stats.format_summary());
    if !args.json {
        println!("{}", report.stats.format_summary());
    }
    Ok(())
}

async fn run_stdio(compressor: &ImageCompressor, session: SessionId) -> Result<()> {
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let command = match Command::parse(&line) {
            Ok(command) => command,
            Err(e) => {
                warn!("Ignoring malformed command: {}", e);
                continue;
            }
        };
        if let Err(e) = compressor.handle(session, command).await {
            error!("Command failed: {}", e);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if args.verbose { "debug" } else { "info" }));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = match args.config.clone().or_else(Config::default_path) {
        Some(path) => path,
        None => return Err(anyhow::anyhow!("No config path given and no home directory found")),
    };
    let provider = ConfigProvider::from_file(config_path.clone(), args.overrides());

    if args.write_config {
        if let Some(dir) = config_path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        provider.snapshot().await?.save_to_file(&config_path).await?;
        info!("Configuration written to {}", config_path.display());
        return Ok(());
    }

    let tools = ToolPathResolver::new();
    debug!("Platform: {}", PlatformCommands::system_info());
    debug!("{}", tools.get_tools_report());

    let progress = if args.json || args.stdio {
        ProgressManager::hidden()
    } else {
        ProgressManager::new(0)
    };
    let sink: Arc<dyn EventSink> = if args.json {
        Arc::new(JsonLinesSink)
    } else {
        Arc::new(ProgressSink::new(progress.clone()))
    };
    let service = Arc::new(match &args.remote_url {
        Some(url) => TinifyClient::with_base_url(url.clone()),
        None => TinifyClient::new(),
    });

    let compressor = ImageCompressor::new(provider, service, sink).with_tools(tools);
    let roots = absolute_roots(&args.paths)?;
    let session = compressor.open_session(&roots, None).await?;

    let result = if args.stdio {
        run_stdio(&compressor, session).await
    } else {
        run_batch(&compressor, session, &args, &progress).await
    };

    compressor.close_session(session).await;
    result
}
