//! # Path Resolution Module
//!
//! Centralizza tutta la logica di calcolo dei path di output.
//!
//! ## Modalità:
//! - `Mirror`: replica il path relativo a `input_root` sotto `output_root`;
//!   i sorgenti fuori da `input_root` finiscono appiattiti in `output_root`
//! - `SameDir`: scrive accanto al sorgente
//!
//! Ogni candidato passa da `ensure_unique`, che aggiunge `(1)`, `(2)`, ...
//! allo stem finché il path non è libero. Il controllo non è atomico tra
//! processi diversi: un batch assume un solo scrittore.

use crate::config::{CompressionRequest, OutputMode};
use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

/// Utility per calcolare i path di output in modo centralizzato
pub struct OutputPathResolver;

impl OutputPathResolver {
    /// Destination before collision handling. Deterministic per source.
    pub fn candidate(source: &Path, request: &CompressionRequest) -> PathBuf {
        let file_name = source.file_name().map(OsString::from).unwrap_or_default();

        match request.output_mode {
            OutputMode::SameDir => source
                .parent()
                .unwrap_or_else(|| Path::new(""))
                .join(file_name),
            OutputMode::Mirror => match Self::relative_to_root(source, &request.input_root) {
                Some(relative) => request.output_root.join(relative),
                None => {
                    debug!(
                        "{} is outside {}, flattening",
                        source.display(),
                        request.input_root.display()
                    );
                    request.output_root.join(file_name)
                }
            },
        }
    }

    /// Collision-free destination for `source`.
    pub fn resolve(source: &Path, request: &CompressionRequest) -> PathBuf {
        Self::ensure_unique(&Self::candidate(source, request))
    }

    /// First of `path`, `stem(1)suffix`, `stem(2)suffix`, ... that does not exist.
    pub fn ensure_unique(path: &Path) -> PathBuf {
        Self::first_free(path, |p| p.exists())
    }

    fn first_free<F>(path: &Path, taken: F) -> PathBuf
    where
        F: Fn(&Path) -> bool,
    {
        if !taken(path) {
            return path.to_path_buf();
        }

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let suffix = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        let mut counter = 1u32;
        loop {
            let next = path.with_file_name(format!("{}({}){}", stem, counter, suffix));
            if !taken(&next) {
                debug!("Destination {} taken, using {}", path.display(), next.display());
                return next;
            }
            counter += 1;
        }
    }

    fn relative_to_root(source: &Path, input_root: &Path) -> Option<PathBuf> {
        if let Ok(relative) = source.strip_prefix(input_root) {
            return Some(relative.to_path_buf());
        }
        // Relative vs absolute spellings of the same tree
        let source = source.canonicalize().ok()?;
        let root = input_root.canonicalize().ok()?;
        source.strip_prefix(&root).ok().map(Path::to_path_buf)
    }
}

/// Destinations already handed out in this batch.
///
/// Resolution and reservation happen under one lock, so concurrent workers
/// never receive the same path even before either has written it.
#[derive(Debug, Default)]
pub struct DestinationClaims {
    claimed: Mutex<HashSet<PathBuf>>,
}

impl DestinationClaims {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves and reserves the destination for `source`.
    pub fn claim(&self, source: &Path, request: &CompressionRequest) -> PathBuf {
        let candidate = OutputPathResolver::candidate(source, request);
        let mut claimed = self.claimed.lock().unwrap_or_else(|e| e.into_inner());
        let destination =
            OutputPathResolver::first_free(&candidate, |p| p.exists() || claimed.contains(p));
        claimed.insert(destination.clone());
        destination
    }
}
