//! # Optimizer Module
//!
//! Separa le responsabilità in sottomoduli:
//! - `media_optimizer`: Orchestratore del batch
//! - `task_optimizer`: Dispatcher per singoli file
//! - `progress_tracker`: Gestione progress unificata
//! - `path_resolver`: Calcolo dei path di output
//! - `postprocess`: Secondo passaggio lossless dopo il codec integrato
//! - `size_guard`: L'output non supera mai il sorgente

pub mod media_optimizer;
pub mod path_resolver;
pub mod postprocess;
pub mod progress_tracker;
pub mod size_guard;
pub mod task_optimizer;

pub use media_optimizer::{BatchCompressor, BatchReport};
pub use path_resolver::{DestinationClaims, OutputPathResolver};
pub use postprocess::PostProcessOptimizer;
pub use progress_tracker::ProgressTracker;
pub use size_guard::SizeGuard;
pub use task_optimizer::{CompressionResult, Compressor};
