//! # JSON Output Module
//!
//! Questo modulo gestisce l'output strutturato in JSON per l'integrazione con
//! altri processi (una riga JSON per evento su stdout).
//!
//! ## Tipi di messaggi:
//! - `start`: Inizio del batch
//! - `file_complete`: Fine elaborazione di un file
//! - `complete`: Fine del batch con statistiche finali
//! - `error`: Errore che impedisce l'avvio del batch

use crate::config::{CompressionRequest, OutputMode, QualityProfile};
use crate::engine::EngineId;
use crate::optimizer::task_optimizer::CompressionResult;
use crate::progress::CompressionStats;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Tipo di messaggio JSON
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum JsonMessage {
    /// Inizio del batch
    #[serde(rename = "start")]
    Start {
        input_root: PathBuf,
        output_root: Option<PathBuf>,
        total_files: usize,
        config: JsonConfig,
    },

    /// Fine elaborazione di un file specifico
    #[serde(rename = "file_complete")]
    FileComplete {
        index: usize,
        total: usize,
        source: PathBuf,
        output: PathBuf,
        original_size: u64,
        compressed_size: u64,
        reduction_percent: f64,
        succeeded: bool,
        engine: Option<EngineId>,
        message: String,
    },

    /// Batch completato
    #[serde(rename = "complete")]
    Complete {
        #[serde(flatten)]
        stats: CompressionStats,
        average_reduction: f64,
        duration_seconds: f64,
    },

    /// Errore generale
    #[serde(rename = "error")]
    Error {
        message: String,
        details: Option<String>,
    },
}

/// Configurazione per output JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonConfig {
    pub lossless: bool,
    pub quality: u8,
    pub profile: QualityProfile,
    pub output_mode: OutputMode,
    pub workers: usize,
}

impl JsonConfig {
    pub fn new(request: &CompressionRequest, workers: usize) -> Self {
        Self {
            lossless: request.lossless,
            quality: request.quality,
            profile: request.profile,
            output_mode: request.output_mode,
            workers,
        }
    }
}

impl JsonMessage {
    /// Emette il messaggio JSON su stdout
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            println!("{}", json);
        }
    }

    pub fn start(request: &CompressionRequest, total_files: usize, workers: usize) -> Self {
        let output_root = match request.output_mode {
            OutputMode::Mirror => Some(request.output_root.clone()),
            OutputMode::SameDir => None,
        };
        Self::Start {
            input_root: request.input_root.clone(),
            output_root,
            total_files,
            config: JsonConfig::new(request, workers),
        }
    }

    pub fn file_complete(result: &CompressionResult, index: usize, total: usize) -> Self {
        Self::FileComplete {
            index,
            total,
            source: result.source.clone(),
            output: result.output.clone(),
            original_size: result.original_size,
            compressed_size: result.compressed_size,
            reduction_percent: result.reduction_percent(),
            succeeded: result.succeeded,
            engine: result.engine,
            message: result.message.clone(),
        }
    }

    pub fn complete(stats: &CompressionStats, duration_seconds: f64) -> Self {
        Self::Complete {
            stats: stats.clone(),
            average_reduction: stats.overall_reduction_percent(),
            duration_seconds,
        }
    }

    pub fn error(message: String, details: Option<String>) -> Self {
        Self::Error { message, details }
    }
}
