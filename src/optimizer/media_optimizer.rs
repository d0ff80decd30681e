//! # Batch Compressor
//!
//! Orchestratore del batch: distribuisce i file ai worker e raccoglie un
//! risultato per ogni input, nello stesso ordine degli input.
//!
//! ## Concorrenza:
//! - Un `Semaphore` limita i worker attivi
//! - Ogni file gira in `spawn_blocking` (i tool esterni sono chiamate bloccanti)
//! - Le destinazioni vengono riservate in un `DestinationClaims` condiviso,
//!   quindi due worker non scrivono mai sullo stesso path
//!
//! Nessun timeout sui processi esterni e nessuna cancellazione: un tool
//! bloccato tiene occupato il suo worker.

use crate::{
    config::{CompressionRequest, OutputMode},
    file_manager::FileManager,
    json_output::JsonMessage,
    optimizer::{
        path_resolver::DestinationClaims,
        progress_tracker::ProgressTracker,
        task_optimizer::{CompressionResult, Compressor},
    },
    progress::CompressionStats,
};
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{error, info};

/// Everything a finished batch produced.
#[derive(Debug, Clone)]
pub struct BatchReport {
    /// One entry per input file, in input order
    pub results: Vec<CompressionResult>,
    pub stats: CompressionStats,
    pub duration: Duration,
}

/// Orchestratore principale
pub struct BatchCompressor {
    compressor: Arc<Compressor>,
    request: Arc<CompressionRequest>,
    workers: usize,
    json_output: bool,
}

impl BatchCompressor {
    /// Crea un nuovo batch; la richiesta viene validata qui
    pub fn new(compressor: Compressor, request: CompressionRequest, workers: usize) -> Result<Self> {
        request.validate()?;
        Ok(Self {
            compressor: Arc::new(compressor),
            request: Arc::new(request),
            workers: workers.max(1),
            json_output: false,
        })
    }

    /// Emit JSON events on stdout instead of drawing a progress bar.
    pub fn with_json_output(mut self, enabled: bool) -> Self {
        self.json_output = enabled;
        self
    }

    /// Esegue il batch sui file indicati
    pub async fn run(&self, files: Vec<PathBuf>) -> Result<BatchReport> {
        let start_time = Instant::now();

        self.emit_start_message(files.len());
        self.log_configuration(files.len());

        let tracker = ProgressTracker::new(files.len(), self.json_output);
        let results = self.process_files_concurrently(files, tracker.clone()).await?;

        let stats = tracker.get_stats();
        tracker.finish(&stats.format_summary());
        let duration = start_time.elapsed();
        self.print_final_stats(&stats, duration);

        Ok(BatchReport {
            results,
            stats,
            duration,
        })
    }

    fn emit_start_message(&self, total_files: usize) {
        if self.json_output {
            JsonMessage::start(&self.request, total_files, self.workers).emit();
        } else {
            info!("Starting compression of {} file(s)", total_files);
        }
    }

    /// Logga configurazione (solo se non JSON mode)
    fn log_configuration(&self, total_files: usize) {
        if self.json_output || total_files == 0 {
            return;
        }

        let request = &self.request;
        if request.lossless {
            info!("Mode: lossless (profile: {})", request.profile);
        } else {
            info!("Mode: lossy (quality: {}, profile: {})", request.quality, request.profile);
        }
        match request.output_mode {
            OutputMode::Mirror => info!(
                "Output: mirror {} -> {}",
                request.input_root.display(),
                request.output_root.display()
            ),
            OutputMode::SameDir => info!("Output: beside each source"),
        }

        let status = self.compressor.engine_status(request.lossless);
        info!(
            "Engines: jpeg={} png={} gif={} webp={}",
            status.jpeg, status.png, status.gif, status.webp
        );
        info!("Workers: {}", self.workers);
    }

    async fn process_files_concurrently(
        &self,
        files: Vec<PathBuf>,
        progress_tracker: ProgressTracker,
    ) -> Result<Vec<CompressionResult>> {
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let claims = Arc::new(DestinationClaims::new());
        let mut sources = Vec::with_capacity(files.len());
        let mut tasks = Vec::with_capacity(files.len());

        for (index, file_path) in files.into_iter().enumerate() {
            let permit = semaphore.clone().acquire_owned().await?;
            let compressor = Arc::clone(&self.compressor);
            let request = Arc::clone(&self.request);
            let claims = Arc::clone(&claims);
            let tracker = progress_tracker.clone();
            sources.push(file_path.clone());

            let task = tokio::task::spawn_blocking(move || {
                let _permit = permit;
                let result = compressor.dispatch_claimed(&file_path, &request, &claims);
                tracker.handle_file_completion(index, &result);
                result
            });
            tasks.push(task);
        }

        let outcomes = futures::future::join_all(tasks).await;
        let results = outcomes
            .into_iter()
            .zip(sources)
            .enumerate()
            .map(|(index, (outcome, source))| match outcome {
                Ok(result) => result,
                Err(e) => {
                    error!("Worker for {} did not finish: {}", source.display(), e);
                    let result = CompressionResult::failed(
                        &source,
                        PathBuf::new(),
                        0,
                        format!("worker failed: {}", e),
                        None,
                    );
                    progress_tracker.handle_file_completion(index, &result);
                    result
                }
            })
            .collect();

        Ok(results)
    }

    /// Stampa statistiche finali
    fn print_final_stats(&self, stats: &CompressionStats, duration: Duration) {
        if self.json_output {
            JsonMessage::complete(stats, duration.as_secs_f64()).emit();
        } else {
            info!("=== Compression Complete ===");
            info!("Files processed: {}", stats.files_processed);
            info!("Files compressed: {}", stats.files_succeeded);
            info!("Failures: {}", stats.files_failed);
            info!("Bytes saved: {}", FileManager::format_size(stats.total_bytes_saved));
            info!("Average reduction: {:.2}%", stats.overall_reduction_percent());
            info!("Duration: {:.2}s", duration.as_secs_f64());
        }
    }
}
