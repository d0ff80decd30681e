//! # File Management Module
//!
//! Questo modulo gestisce la discovery delle immagini e alcune utilità sui file.
//! Vive fuori dal dispatcher: il core riceve sempre una lista di path.
//!
//! ## Responsabilità:
//! - Espansione degli input (file singoli e directory ricorsive)
//! - Filtro per estensione secondo il set `formats` della richiesta
//! - Formattazione human-readable delle dimensioni
//! - Calcolo percentuale di riduzione
//!
//! ## Esempio:
//! ```rust,no_run
//! use imgcompress::config::CompressionRequest;
//! use imgcompress::file_manager::FileManager;
//! use std::path::PathBuf;
//!
//! let request = CompressionRequest::default();
//! let files = FileManager::collect_inputs(&[PathBuf::from("photos")], &request).unwrap();
//! println!("{} images", files.len());
//! ```

use crate::config::CompressionRequest;
use anyhow::Result;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Manages file discovery and size helpers
pub struct FileManager;

impl FileManager {
    /// Find all images with an accepted extension under `dir`, sorted by path
    pub fn find_images(dir: &Path, request: &CompressionRequest) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| match e {
                Ok(entry) => Some(entry),
                Err(err) => {
                    warn!("Skipping unreadable entry: {}", err);
                    None
                }
            })
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|path| request.accepts(path))
            .collect();
        files.sort();
        files
    }

    /// Expands inputs into a de-duplicated file list.
    ///
    /// Explicit files are kept whatever their extension, so an unsupported
    /// one still yields a result. Directories contribute accepted images only.
    pub fn collect_inputs(inputs: &[PathBuf], request: &CompressionRequest) -> Result<Vec<PathBuf>> {
        let mut seen = HashSet::new();
        let mut files = Vec::new();

        for input in inputs {
            if input.is_dir() {
                let found = Self::find_images(input, request);
                debug!("{}: {} image(s)", input.display(), found.len());
                for file in found {
                    if seen.insert(file.clone()) {
                        files.push(file);
                    }
                }
            } else if input.exists() {
                if seen.insert(input.clone()) {
                    files.push(input.clone());
                }
            } else {
                return Err(anyhow::anyhow!("Input does not exist: {}", input.display()));
            }
        }

        Ok(files)
    }

    /// Get human-readable file size
    pub fn format_size(size: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = size as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size as u64, UNITS[unit_index])
        } else {
            format!("{:.2} {}", size, UNITS[unit_index])
        }
    }

    /// Calculate percentage reduction
    pub fn calculate_reduction(original_size: u64, new_size: u64) -> f64 {
        if original_size == 0 {
            0.0
        } else {
            ((original_size as f64 - new_size as f64) / original_size as f64) * 100.0
        }
    }
}
