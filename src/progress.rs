//! # Progress Tracking and Statistics Module
//!
//! Questo modulo gestisce il progress tracking e le statistiche di compressione.
//!
//! ## Responsabilità:
//! - Progress bar visuale con `indicatif` per feedback real-time
//! - Tracking statistiche (file compressi, falliti, byte risparmiati)
//! - Calcolo percentuali di riduzione
//!
//! ## Componenti principali:
//! - `ProgressManager`: Gestisce la progress bar principale (nascosta in modalità JSON)
//! - `CompressionStats`: Traccia statistiche cumulative
//!
//! ## Visual feedback:
//! ```text
//! ⠋ [00:00:12] [========================>---------------] 96/150 (64%) [OK] photo.jpg: 45.2% saved
//! ```
//!
//! ## Esempio:
//! ```rust
//! use imgcompress::progress::{CompressionStats, ProgressManager};
//!
//! let progress = ProgressManager::hidden(1);
//! let mut stats = CompressionStats::new();
//!
//! stats.add_succeeded(1000, 600);
//! progress.update("photo.jpg");
//! progress.finish(&stats.format_summary());
//! ```

use crate::file_manager::FileManager;
use crate::optimizer::task_optimizer::CompressionResult;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use serde::Serialize;
use std::time::Duration;

/// Manages progress reporting for a compression batch
#[derive(Clone)]
pub struct ProgressManager {
    bar: ProgressBar,
}

impl ProgressManager {
    /// Create a new progress manager
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

    /// Progress manager that draws nothing, used when stdout carries JSON.
    pub fn hidden(total_files: u64) -> Self {
        Self {
            bar: ProgressBar::with_draw_target(Some(total_files), ProgressDrawTarget::hidden()),
        }
    }

    /// Update progress with a message
    pub fn update(&self, message: &str) {
        self.bar.inc(1);
        self.bar.set_message(message.to_string());
    }

    /// Finish with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }
}

/// Aggregate counts for a batch
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CompressionStats {
    pub files_processed: usize,
    pub files_succeeded: usize,
    pub files_failed: usize,
    pub total_bytes_saved: u64,
    pub total_original_size: u64,
}

impl CompressionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_succeeded(&mut self, original_size: u64, new_size: u64) {
        self.files_processed += 1;
        self.files_succeeded += 1;
        self.total_original_size += original_size;
        self.total_bytes_saved += original_size.saturating_sub(new_size);
    }

    pub fn add_failed(&mut self) {
        self.files_processed += 1;
        self.files_failed += 1;
    }

    pub fn record(&mut self, result: &CompressionResult) {
        if result.succeeded {
            self.add_succeeded(result.original_size, result.compressed_size);
        } else {
            self.add_failed();
        }
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
            "Processed: {} files | Compressed: {} | Failed: {} | Total saved: {} ({:.2}%)",
            self.files_processed,
            self.files_succeeded,
            self.files_failed,
            FileManager::format_size(self.total_bytes_saved),
            self.overall_reduction_percent()
        )
    }
}
