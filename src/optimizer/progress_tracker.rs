//! # Progress Tracking Module
//!
//! Tracker thread-safe condiviso dai worker del batch.
//! Gestisce sia output JSON che progress bar tradizionale.
//!
//! I worker girano in `spawn_blocking`, quindi lo stato è protetto da un
//! `std::sync::Mutex` e non da un mutex async.

use crate::{
    json_output::JsonMessage,
    optimizer::task_optimizer::CompressionResult,
    progress::{CompressionStats, ProgressManager},
};
use std::sync::{Arc, Mutex};

/// Tracker progress unificato
#[derive(Clone)]
pub struct ProgressTracker {
    pub total_files: usize,
    json_output: bool,
    stats: Arc<Mutex<CompressionStats>>,
    progress_manager: ProgressManager,
}

impl ProgressTracker {
    /// Crea un nuovo tracker; la barra è nascosta in modalità JSON
    pub fn new(total_files: usize, json_output: bool) -> Self {
        let progress_manager = if json_output {
            ProgressManager::hidden(total_files as u64)
        } else {
            ProgressManager::new(total_files as u64)
        };
        Self {
            total_files,
            json_output,
            stats: Arc::new(Mutex::new(CompressionStats::new())),
            progress_manager,
        }
    }

    /// Registra il risultato di un file, aggiorna la barra ed emette l'evento JSON
    pub fn handle_file_completion(&self, index: usize, result: &CompressionResult) {
        self.stats
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .record(result);

        if self.json_output {
            JsonMessage::file_complete(result, index, self.total_files).emit();
        }

        let name = result
            .source
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .into_owned();
        let message = if result.succeeded {
            format!("[OK] {}: {:.1}% saved", name, result.reduction_percent())
        } else {
            format!("[ERROR] {}: {}", name, result.message)
        };
        self.progress_manager.update(&message);
    }

    /// Finalizza progress bar
    pub fn finish(&self, summary: &str) {
        self.progress_manager.finish(summary);
    }

    /// Ottieni statistiche per report finale
    pub fn get_stats(&self) -> CompressionStats {
        self.stats.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}
