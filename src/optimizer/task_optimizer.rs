//! # Task Optimizer Module
//!
//! Worker per la compressione di un singolo file.
//!
//! ## Flusso per file:
//! 1. Token di estensione → motore registrato (altrimenti `UnsupportedFormat`)
//! 2. Calcolo della destinazione e creazione delle directory mancanti
//! 3. Catena di fallback del motore
//! 4. Post-pass lossless se ha vinto il codec integrato (mai con un tool
//!    che ha già fallito nella catena)
//! 5. Size guard
//!
//! Ogni errore resta confinato al file: il risultato riporta `succeeded = false`
//! e il messaggio, il batch prosegue.

use crate::config::CompressionRequest;
use crate::engine::{
    extension_token, EngineContext, EngineId, EngineJob, EngineRegistry, EngineStatus, EngineStatusCache,
    ImageFormatKind,
};
use crate::error::CompressError;
use crate::file_manager::FileManager;
use crate::optimizer::path_resolver::{DestinationClaims, OutputPathResolver};
use crate::optimizer::postprocess::PostProcessOptimizer;
use crate::optimizer::size_guard::SizeGuard;
use crate::platform::{CommandRunner, SystemCommandRunner};
use crate::tool_resolver::{ToolLookup, ToolResolver};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Outcome for one source file.
///
/// When `succeeded` is true, `compressed_size <= original_size`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompressionResult {
    pub source: PathBuf,
    pub output: PathBuf,
    pub original_size: u64,
    pub compressed_size: u64,
    pub succeeded: bool,
    pub message: String,
    /// `None` when no engine was invoked
    pub engine: Option<EngineId>,
}

impl CompressionResult {
    pub(crate) fn failed(
        source: &Path,
        output: PathBuf,
        original_size: u64,
        message: impl Into<String>,
        engine: Option<EngineId>,
    ) -> Self {
        Self {
            source: source.to_path_buf(),
            output,
            original_size,
            compressed_size: original_size,
            succeeded: false,
            message: message.into(),
            engine,
        }
    }

    pub fn bytes_saved(&self) -> u64 {
        self.original_size.saturating_sub(self.compressed_size)
    }

    pub fn reduction_percent(&self) -> f64 {
        FileManager::calculate_reduction(self.original_size, self.compressed_size)
    }
}

/// Single-file dispatcher.
///
/// Shared read-only across workers; the tool cache and engine status cache
/// it holds are filled once and then only read.
pub struct Compressor {
    tools: Arc<dyn ToolLookup>,
    runner: Arc<dyn CommandRunner>,
    registry: EngineRegistry,
    status: EngineStatusCache,
}

impl Compressor {
    pub fn new(tools: Arc<dyn ToolLookup>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            tools,
            runner,
            registry: EngineRegistry::default(),
            status: EngineStatusCache::new(),
        }
    }

    /// Compressor for the running process: detected tool paths, real processes.
    pub fn detect() -> Self {
        Self::new(Arc::new(ToolResolver::detect()), Arc::new(SystemCommandRunner))
    }

    pub fn with_registry(mut self, registry: EngineRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Engine each format would start with, cached per `lossless` value.
    pub fn engine_status(&self, lossless: bool) -> &EngineStatus {
        self.status.get(self.tools.as_ref(), lossless)
    }

    fn context(&self) -> EngineContext<'_> {
        EngineContext {
            tools: self.tools.as_ref(),
            runner: self.runner.as_ref(),
        }
    }

    /// Compresses one file, resolving its destination against the filesystem only.
    pub fn dispatch(&self, source: &Path, request: &CompressionRequest) -> CompressionResult {
        self.dispatch_claimed(source, request, &DestinationClaims::new())
    }

    /// Compresses one file with a destination reserved in `claims`.
    pub fn dispatch_claimed(
        &self,
        source: &Path,
        request: &CompressionRequest,
        claims: &DestinationClaims,
    ) -> CompressionResult {
        let original_size = match fs::metadata(source) {
            Ok(metadata) => metadata.len(),
            Err(e) => {
                let output = OutputPathResolver::candidate(source, request);
                return CompressionResult::failed(
                    source,
                    output,
                    0,
                    format!("cannot read source: {}", e),
                    None,
                );
            }
        };

        let token = extension_token(source);
        let engine_fn = token.as_deref().and_then(|t| self.registry.get(t));
        let Some(engine_fn) = engine_fn else {
            debug!("No engine for {}", source.display());
            let output = OutputPathResolver::candidate(source, request);
            let err = CompressError::UnsupportedFormat(token.unwrap_or_else(|| "(no extension)".to_string()));
            return CompressionResult::failed(source, output, original_size, err.to_string(), None);
        };

        let destination = claims.claim(source, request);
        if let Some(parent) = destination.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                return CompressionResult::failed(
                    source,
                    destination.clone(),
                    original_size,
                    format!("cannot create {}: {}", parent.display(), e),
                    None,
                );
            }
        }

        let job = EngineJob {
            source,
            destination: &destination,
            request,
        };
        let ctx = self.context();
        let engine = match engine_fn(&job, &ctx) {
            Ok(engine) => engine,
            Err(e) => {
                warn!("Failed to compress {}: {}", source.display(), e);
                if destination.exists() {
                    let _ = fs::remove_file(&destination);
                }
                return CompressionResult::failed(
                    source,
                    destination,
                    original_size,
                    e.to_string(),
                    Some(EngineId::Builtin),
                );
            }
        };
        debug!("{} compressed by {}", source.display(), engine);

        if engine == EngineId::Builtin {
            let kind = token.as_deref().and_then(ImageFormatKind::from_token);
            if let Some(kind) = kind.filter(|k| PostProcessOptimizer::applies(*k, request.lossless)) {
                PostProcessOptimizer::new(ctx).run(kind, &destination);
            }
        }

        match SizeGuard::enforce(source, &destination, original_size) {
            Ok(compressed_size) => CompressionResult {
                source: source.to_path_buf(),
                output: destination,
                original_size,
                compressed_size,
                succeeded: true,
                message: "ok".to_string(),
                engine: Some(engine),
            },
            Err(e) => CompressionResult::failed(
                source,
                destination,
                original_size,
                format!("size check failed: {}", e),
                Some(engine),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_support::{FakeRunner, FakeTools};
    use crate::error::Result;
    use tempfile::TempDir;

    fn compressor(tools: FakeTools, runner: FakeRunner) -> Compressor {
        Compressor::new(Arc::new(tools), Arc::new(runner))
    }

    fn request(dir: &Path) -> CompressionRequest {
        CompressionRequest {
            input_root: dir.join("in"),
            output_root: dir.join("out"),
            ..Default::default()
        }
    }

    #[test]
    fn test_unsupported_extension_invokes_nothing() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("in").join("scan.tiff");
        fs::create_dir_all(source.parent().unwrap()).unwrap();
        fs::write(&source, b"II*\0").unwrap();

        let result = compressor(FakeTools::default(), FakeRunner::failing())
            .dispatch(&source, &request(dir.path()));
        assert!(!result.succeeded);
        assert_eq!(result.engine, None);
        assert_eq!(result.message, "unsupported format: tiff");
        assert_eq!(result.compressed_size, result.original_size);
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn test_missing_source_is_a_failed_result() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("in").join("gone.png");
        let result = compressor(FakeTools::default(), FakeRunner::failing())
            .dispatch(&source, &request(dir.path()));
        assert!(!result.succeeded);
        assert!(result.message.contains("cannot read source"));
    }

    #[test]
    fn test_tool_output_larger_than_source_is_capped() {
        fn bloated(job: &EngineJob<'_>, _: &EngineContext<'_>) -> Result<EngineId> {
            fs::write(job.destination, vec![0u8; 4096])?;
            Ok(EngineId::Pngquant)
        }

        let dir = TempDir::new().unwrap();
        let source = dir.path().join("in").join("a").join("b.png");
        fs::create_dir_all(source.parent().unwrap()).unwrap();
        fs::write(&source, b"tiny source").unwrap();

        let compressor = compressor(FakeTools::default(), FakeRunner::failing())
            .with_registry(EngineRegistry::empty().with_engine("png", bloated));
        let result = compressor.dispatch(&source, &request(dir.path()));

        assert!(result.succeeded, "{}", result.message);
        assert_eq!(result.engine, Some(EngineId::Pngquant));
        assert_eq!(result.output, dir.path().join("out").join("a").join("b.png"));
        assert_eq!(result.compressed_size, result.original_size);
        assert_eq!(fs::read(&result.output).unwrap(), b"tiny source");
    }

    #[test]
    fn test_decode_failure_surfaces_message() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("in").join("broken.png");
        fs::create_dir_all(source.parent().unwrap()).unwrap();
        fs::write(&source, b"\x89PNG\r\n\x1a\ngarbage").unwrap();

        let result = compressor(FakeTools::default(), FakeRunner::failing())
            .dispatch(&source, &request(dir.path()));
        assert!(!result.succeeded);
        assert!(result.message.starts_with("Decode error"), "{}", result.message);
        assert!(!result.output.exists());
    }

    fn write_photo(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        image::RgbImage::from_fn(32, 32, |x, y| image::Rgb([(x * 8) as u8, (y * 8) as u8, 90]))
            .save(path)
            .unwrap();
    }

    #[test]
    fn test_builtin_png_gets_post_pass() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("in").join("photo.png");
        write_photo(&source);

        let runner = Arc::new(FakeRunner::writing("--out"));
        let compressor = Compressor::new(Arc::new(FakeTools::with(&["oxipng"])), runner.clone());
        let result = compressor.dispatch(&source, &request(dir.path()));

        assert!(result.succeeded, "{}", result.message);
        assert_eq!(result.engine, Some(EngineId::Builtin));
        assert_eq!(runner.call_count(), 1);
        assert_eq!(fs::read(&result.output).unwrap(), b"x");
        assert!(!PostProcessOptimizer::temp_path(&result.output).exists());
    }

    #[test]
    fn test_external_winner_skips_post_pass() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("in").join("photo.png");
        write_photo(&source);

        let runner = Arc::new(FakeRunner::writing("--output"));
        let tools = FakeTools::with(&["pngquant", "oxipng"]);
        let compressor = Compressor::new(Arc::new(tools), runner.clone());
        let result = compressor.dispatch(&source, &request(dir.path()));

        assert!(result.succeeded, "{}", result.message);
        assert_eq!(result.engine, Some(EngineId::Pngquant));
        assert_eq!(runner.call_count(), 1);
        let calls = runner.calls.lock().unwrap();
        assert!(calls[0].0.ends_with("pngquant"));
    }

    #[test]
    fn test_engine_status_reflects_tools() {
        let compressor = compressor(FakeTools::with(&["gifsicle", "cwebp"]), FakeRunner::failing());
        let status = compressor.engine_status(false);
        assert_eq!(status.gif, EngineId::Gifsicle);
        assert_eq!(status.webp, EngineId::Cwebp);
        assert_eq!(status.jpeg, EngineId::Builtin);
    }
}
