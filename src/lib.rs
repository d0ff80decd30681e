//! # Image Compression Library
//!
//! Questo è il modulo principale della libreria che espone tutte le API pubbliche.
//!
//! ## Responsabilità:
//! - Definisce la struttura modulare dell'applicazione
//! - Espone i tipi e le funzioni principali tramite re-exports
//! - Fornisce un'interfaccia pulita per il main.rs e per altri consumatori
//!
//! ## Architettura dei moduli:
//! - `config`: Richiesta di compressione, profili e validazione
//! - `error`: Tipi di errore custom
//! - `quality`: Mappatura qualità/profilo → parametri dei tool
//! - `platform`: Chiavi piattaforma e porta `CommandRunner`
//! - `tool_resolver`: Discovery e cache dei tool esterni
//! - `engine`: Catene di fallback per JPEG, PNG, GIF e WebP
//! - `optimizer`: Dispatcher per file, path di output, post-pass, size guard, batch
//! - `file_manager`: Discovery delle immagini nelle directory
//! - `progress` / `json_output`: Progress bar, statistiche ed eventi JSON
//!
//! ## Utilizzo:
//! ```rust,no_run
//! use imgcompress::{CompressionRequest, Compressor};
//! use std::path::Path;
//!
//! let compressor = Compressor::detect();
//! let result = compressor.dispatch(Path::new("photos/cat.png"), &CompressionRequest::default());
//! println!("{} -> {} bytes via {:?}", result.original_size, result.compressed_size, result.engine);
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod file_manager;
pub mod json_output;
pub mod optimizer;
pub mod platform;
pub mod progress;
pub mod quality;
pub mod tool_resolver;
pub mod utils;

pub use config::{CompressionRequest, OutputMode, QualityProfile};
pub use engine::{EngineId, EngineRegistry, EngineStatusCache};
pub use error::CompressError;
pub use optimizer::{BatchCompressor, CompressionResult, Compressor, OutputPathResolver};
pub use platform::{CommandOutput, CommandRunner, SystemCommandRunner};
pub use tool_resolver::{ToolCache, ToolLookup, ToolResolver, ToolSearchPaths};
