//! # Progress Tracking and Statistics Module
//!
//! Questo modulo gestisce il progress tracking e le statistiche di compressione.
//!
//! ## Responsabilità:
//! - Progress bar visuale con `indicatif` per feedback real-time
//! - `ProgressSink`: riceve gli eventi IPC e avanza la barra ad ogni job concluso
//! - `CompressionStats`: conteggi fulfilled/rejected/skipped e byte risparmiati
//!
//! ## Visual feedback:
//! ```text
//! ⠋ [00:00:04] [========================>-------] 7/10 (70%) logo.png: 38.2% saved
//! ```
//!
//! ## Esempio:
//! ```rust
//! use asset_compressor::progress::CompressionStats;
//!
//! let mut stats = CompressionStats::new();
//! stats.add_compressed(1000, 600);
//! stats.add_failed();
//! assert_eq!(stats.total_bytes_saved, 400);
//! assert!(stats.format_summary().contains("Rejected: 1"));
//! ```

use crate::file_manager::FileManager;
use crate::ipc::{Event, EventSink, Signal, Status};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::time::Duration;

/// Manages the CLI progress bar
#[derive(Clone)]
pub struct ProgressManager {
    bar: ProgressBar,
}

impl ProgressManager {
    pub fn new(total_files: u64) -> Self {
        let bar = ProgressBar::new(total_files);

        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
        {
            bar.set_style(style.progress_chars("=>-"));
        }
        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Progress manager that draws nothing
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    pub fn set_length(&self, total_files: u64) {
        self.bar.set_length(total_files);
    }

    /// Advance by one with a message
    pub fn update(&self, message: &str) {
        self.bar.inc(1);
        self.bar.set_message(message.to_string());
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}

/// Event sink advancing a progress bar on every settled job
pub struct ProgressSink {
    progress: ProgressManager,
}

impl ProgressSink {
    pub fn new(progress: ProgressManager) -> Self {
        Self { progress }
    }

    fn describe(event: &Event) -> String {
        let data = &event.payload.data;
        let name = data["name"].as_str().unwrap_or("file");
        match event.payload.status {
            Status::Rejected => format!(
                "❌ {}: {}",
                name,
                event.payload.error.as_deref().unwrap_or("failed")
            ),
            Status::Fulfilled => {
                let original = data["file"]["size"].as_u64();
                let optimized = data["optimizedSize"].as_u64();
                match (original, optimized) {
                    (Some(original), Some(optimized)) => format!(
                        "✅ {}: {:.1}% saved",
                        name,
                        FileManager::calculate_reduction(original, optimized)
                    ),
                    _ => format!("✅ {}", name),
                }
            }
        }
    }
}

impl EventSink for ProgressSink {
    fn emit(&self, event: &Event) {
        if matches!(event.signal, Signal::Compressed | Signal::CurrentCompressed) {
            self.progress.update(&Self::describe(event));
        }
    }
}

/// Statistics for one compression run
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressionStats {
    pub files_processed: usize,
    pub files_fulfilled: usize,
    pub files_rejected: usize,
    pub files_skipped: usize,
    pub total_bytes_saved: u64,
    pub total_original_size: u64,
}

impl CompressionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_compressed(&mut self, original_size: u64, new_size: u64) {
        self.files_processed += 1;
        self.files_fulfilled += 1;
        self.total_original_size += original_size;
        self.total_bytes_saved += original_size.saturating_sub(new_size);
    }

    pub fn add_skipped(&mut self) {
        self.files_processed += 1;
        self.files_skipped += 1;
    }

    pub fn add_failed(&mut self) {
        self.files_processed += 1;
        self.files_rejected += 1;
    }

    pub fn overall_reduction_percent(&self) -> f64 {
        if self.total_original_size > 0 {
            (self.total_bytes_saved as f64 / self.total_original_size as f64) * 100.0
        } else {
            0.0
        }
    }

    pub fn format_summary(&self) -> String {
        format!(
            "Processed: {} files | Fulfilled: {} | Rejected: {} | Skipped: {} | Total saved: {} ({:.2}%)",
            self.files_processed,
            self.files_fulfilled,
            self.files_rejected,
            self.files_skipped,
            FileManager::format_size(self.total_bytes_saved),
            self.overall_reduction_percent()
        )
    }
}
