//! # Format Engines
//!
//! Questo modulo contiene i motori di compressione per formato e il loro
//! contratto comune.
//!
//! ## Responsabilità:
//! - Definisce le catene di fallback come sequenze statiche di `Strategy`
//! - Esegue una catena tramite la porta `CommandRunner` (`run_chain`)
//! - Mappa un token di estensione al motore di formato (`EngineRegistry`)
//! - Memorizza lo stato dei motori disponibili per valore di `lossless`
//!
//! ## Contratto di una catena:
//! Ogni livello ha successo solo se il processo esce con codice 0 e la
//! destinazione esiste. Un tool non trovato viene saltato; un tool fallito
//! fa passare al livello successivo. Esaurita la catena, il motore usa il
//! codec integrato.

pub mod gif;
pub mod jpeg;
pub mod png;
pub mod quantize;
pub mod strategy;
pub mod webp;

pub use strategy::{PngOptimizerKind, Strategy};

use crate::config::CompressionRequest;
use crate::error::{CompressError, Result};
use crate::platform::CommandRunner;
use crate::tool_resolver::ToolLookup;
use crate::utils::display_args;
use image::{DynamicImage, ImageFormat};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Identity of whatever produced a compressed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineId {
    Jpegtran,
    Mozjpeg,
    Oxipng,
    Optipng,
    Pngquant,
    Gifsicle,
    Cwebp,
    Builtin,
}

impl fmt::Display for EngineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Jpegtran => "jpegtran",
            Self::Mozjpeg => "mozjpeg",
            Self::Oxipng => "oxipng",
            Self::Optipng => "optipng",
            Self::Pngquant => "pngquant",
            Self::Gifsicle => "gifsicle",
            Self::Cwebp => "cwebp",
            Self::Builtin => "builtin",
        };
        f.write_str(name)
    }
}

/// A single file handed to a format engine.
#[derive(Debug, Clone, Copy)]
pub struct EngineJob<'a> {
    pub source: &'a Path,
    pub destination: &'a Path,
    pub request: &'a CompressionRequest,
}

/// Collaborators an engine needs to try external tools.
#[derive(Clone, Copy)]
pub struct EngineContext<'a> {
    pub tools: &'a dyn ToolLookup,
    pub runner: &'a dyn CommandRunner,
}

/// Per-format compression routine. Writes `job.destination` and reports who did it.
pub type EngineFn = fn(&EngineJob<'_>, &EngineContext<'_>) -> Result<EngineId>;

/// Runs `chain` in order and returns the first tier that produced the destination.
///
/// Each tier is attempted at most once. Leftovers of a failed tier are removed
/// so the next tier starts from an empty destination.
pub fn run_chain(chain: &[Strategy], job: &EngineJob<'_>, ctx: &EngineContext<'_>) -> Option<EngineId> {
    for strategy in chain {
        let Some(tool) = ctx.tools.resolve(strategy.tool_names()) else {
            debug!("{:?}: no tool among {:?}", strategy, strategy.tool_names());
            continue;
        };

        let args = strategy.build_args(&tool, job);
        match ctx.runner.execute(&tool, &args) {
            Ok(output) if output.success() && job.destination.exists() => {
                return Some(strategy.engine_id(&tool));
            }
            Ok(output) => {
                debug!(
                    "{} failed with {:?}: {}",
                    display_args(tool.as_os_str(), &args),
                    output.exit_code,
                    String::from_utf8_lossy(&output.stderr).trim()
                );
            }
            Err(e) => {
                debug!("Failed to launch {}: {}", tool.display(), e);
            }
        }

        if job.destination.exists() {
            if let Err(e) = std::fs::remove_file(job.destination) {
                warn!("Could not remove partial output {}: {}", job.destination.display(), e);
            }
        }
    }
    None
}

/// Image formats with a dedicated engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormatKind {
    Jpeg,
    Png,
    Gif,
    Webp,
}

impl ImageFormatKind {
    pub const ALL: [ImageFormatKind; 4] = [Self::Jpeg, Self::Png, Self::Gif, Self::Webp];

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "gif" => Some(Self::Gif),
            "webp" => Some(Self::Webp),
            _ => None,
        }
    }

    pub fn token(self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Gif => "gif",
            Self::Webp => "webp",
        }
    }

    /// External tiers tried before the built-in codec.
    pub fn chain(self, lossless: bool) -> &'static [Strategy] {
        match (self, lossless) {
            (Self::Jpeg, true) => &[Strategy::Jpegtran],
            (Self::Jpeg, false) => &[Strategy::Cjpeg],
            (Self::Png, true) => &[Strategy::PngOptimizer],
            (Self::Png, false) => &[Strategy::Pngquant],
            (Self::Gif, _) => &[Strategy::Gifsicle],
            (Self::Webp, _) => &[Strategy::Cwebp],
        }
    }

    pub fn image_format(self) -> ImageFormat {
        match self {
            Self::Jpeg => ImageFormat::Jpeg,
            Self::Png => ImageFormat::Png,
            Self::Gif => ImageFormat::Gif,
            Self::Webp => ImageFormat::WebP,
        }
    }

    pub fn engine(self) -> EngineFn {
        match self {
            Self::Jpeg => jpeg::compress,
            Self::Png => png::compress,
            Self::Gif => gif::compress,
            Self::Webp => webp::compress,
        }
    }
}

/// Lowercased extension without its leading dot, if the path has one.
pub fn extension_token(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .filter(|ext| !ext.is_empty())
}

/// Extension token to engine routine.
#[derive(Clone)]
pub struct EngineRegistry {
    engines: HashMap<String, EngineFn>,
}

impl Default for EngineRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        for (token, kind) in [
            ("jpg", ImageFormatKind::Jpeg),
            ("jpeg", ImageFormatKind::Jpeg),
            ("png", ImageFormatKind::Png),
            ("gif", ImageFormatKind::Gif),
            ("webp", ImageFormatKind::Webp),
        ] {
            registry = registry.with_engine(token, kind.engine());
        }
        registry
    }
}

impl EngineRegistry {
    pub fn empty() -> Self {
        Self {
            engines: HashMap::new(),
        }
    }

    /// Registers or replaces the engine for `token`.
    pub fn with_engine(mut self, token: &str, engine: EngineFn) -> Self {
        self.engines
            .insert(token.trim_start_matches('.').to_lowercase(), engine);
        self
    }

    pub fn get(&self, token: &str) -> Option<EngineFn> {
        self.engines.get(token).copied()
    }

    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.engines.keys().map(String::as_str)
    }
}

impl fmt::Debug for EngineRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tokens: Vec<_> = self.tokens().collect();
        tokens.sort_unstable();
        f.debug_struct("EngineRegistry").field("tokens", &tokens).finish()
    }
}

/// Engine each format would currently start with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineStatus {
    pub jpeg: EngineId,
    pub png: EngineId,
    pub gif: EngineId,
    pub webp: EngineId,
}

impl EngineStatus {
    /// First resolvable tier per format, or `Builtin` when none resolves.
    pub fn probe(tools: &dyn ToolLookup, lossless: bool) -> Self {
        let pick = |kind: ImageFormatKind| {
            kind.chain(lossless)
                .iter()
                .find_map(|strategy| {
                    tools
                        .resolve(strategy.tool_names())
                        .map(|tool| strategy.engine_id(&tool))
                })
                .unwrap_or(EngineId::Builtin)
        };
        Self {
            jpeg: pick(ImageFormatKind::Jpeg),
            png: pick(ImageFormatKind::Png),
            gif: pick(ImageFormatKind::Gif),
            webp: pick(ImageFormatKind::Webp),
        }
    }

    pub fn get(&self, kind: ImageFormatKind) -> EngineId {
        match kind {
            ImageFormatKind::Jpeg => self.jpeg,
            ImageFormatKind::Png => self.png,
            ImageFormatKind::Gif => self.gif,
            ImageFormatKind::Webp => self.webp,
        }
    }
}

/// Status snapshots, computed once per `lossless` value.
///
/// Installed tools are assumed not to change during a run.
#[derive(Debug, Default)]
pub struct EngineStatusCache {
    lossy: OnceLock<EngineStatus>,
    lossless: OnceLock<EngineStatus>,
}

impl EngineStatusCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, tools: &dyn ToolLookup, lossless: bool) -> &EngineStatus {
        let slot = if lossless { &self.lossless } else { &self.lossy };
        slot.get_or_init(|| EngineStatus::probe(tools, lossless))
    }
}

/// Decodes `source` with the built-in codec.
///
/// The container is sniffed from content; a mismatch with the extension is
/// logged and decoding follows the content.
pub fn open_image(source: &Path, expected: ImageFormat) -> Result<DynamicImage> {
    let mut reader = image::io::Reader::open(source)?.with_guessed_format()?;
    match reader.format() {
        Some(actual) if actual != expected => warn!(
            "{} looks like {:?}, not {:?}",
            source.display(),
            actual,
            expected
        ),
        Some(_) => {}
        None => {
            debug!("{}: format not recognised from content", source.display());
            reader.set_format(expected);
        }
    }
    reader
        .decode()
        .map_err(|e| CompressError::decode(format!("{}: {}", source.display(), e)))
}

/// Runs the format's chain and falls back to `builtin` when every tier declines.
pub(crate) fn chain_or_builtin<F>(
    kind: ImageFormatKind,
    job: &EngineJob<'_>,
    ctx: &EngineContext<'_>,
    builtin: F,
) -> Result<EngineId>
where
    F: FnOnce(&EngineJob<'_>) -> Result<()>,
{
    if let Some(engine) = run_chain(kind.chain(job.request.lossless), job, ctx) {
        return Ok(engine);
    }
    debug!("{}: using built-in {} codec", job.source.display(), kind.token());
    builtin(job)?;
    Ok(EngineId::Builtin)
}

/// Writes `bytes` to the job destination.
pub(crate) fn write_output(job: &EngineJob<'_>, bytes: &[u8]) -> Result<()> {
    std::fs::write(job.destination, bytes)?;
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::test_support::{FakeRunner, FakeTools};
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_chain_skips_missing_and_records_winner() {
        let dir = TempDir::new().unwrap();
        let (src, dst) = (dir.path().join("a.png"), dir.path().join("out.png"));
        std::fs::write(&src, b"png").unwrap();
        let request = CompressionRequest {
            lossless: true,
            ..Default::default()
        };
        let job = EngineJob {
            source: &src,
            destination: &dst,
            request: &request,
        };

        let tools = FakeTools::with(&["oxipng"]);
        let runner = FakeRunner::writing("--out");
        let ctx = EngineContext {
            tools: &tools,
            runner: &runner,
        };
        assert_eq!(run_chain(ImageFormatKind::Png.chain(true), &job, &ctx), Some(EngineId::Oxipng));
        assert_eq!(runner.call_count(), 1);
        assert!(dst.exists());
    }

    #[test]
    fn test_chain_exit_zero_without_output_is_failure() {
        let dir = TempDir::new().unwrap();
        let (src, dst) = (dir.path().join("a.gif"), dir.path().join("out.gif"));
        let request = CompressionRequest::default();
        let job = EngineJob {
            source: &src,
            destination: &dst,
            request: &request,
        };

        let tools = FakeTools::with(&["gifsicle"]);
        let runner = FakeRunner::writing("--never-present");
        let ctx = EngineContext {
            tools: &tools,
            runner: &runner,
        };
        assert_eq!(run_chain(ImageFormatKind::Gif.chain(false), &job, &ctx), None);
        assert_eq!(runner.call_count(), 1);
    }

    #[test]
    fn test_failed_tier_leaves_no_partial_output() {
        let dir = TempDir::new().unwrap();
        let (src, dst) = (dir.path().join("a.jpg"), dir.path().join("out.jpg"));
        std::fs::write(&dst, b"partial").unwrap();
        let request = CompressionRequest::default();
        let job = EngineJob {
            source: &src,
            destination: &dst,
            request: &request,
        };

        let tools = FakeTools::with(&["cjpeg"]);
        let runner = FakeRunner::failing();
        let ctx = EngineContext {
            tools: &tools,
            runner: &runner,
        };
        assert_eq!(run_chain(ImageFormatKind::Jpeg.chain(false), &job, &ctx), None);
        assert!(!dst.exists());
    }

    #[test]
    fn test_registry_tokens_and_override() {
        fn fake(_: &EngineJob<'_>, _: &EngineContext<'_>) -> Result<EngineId> {
            Ok(EngineId::Cwebp)
        }

        let registry = EngineRegistry::default();
        for token in ["jpg", "jpeg", "png", "gif", "webp"] {
            assert!(registry.get(token).is_some(), "{}", token);
        }
        assert!(registry.get("tiff").is_none());

        let registry = EngineRegistry::empty().with_engine(".PNG", fake);
        assert!(registry.get("png").is_some());
        assert!(registry.get("jpg").is_none());
    }

    #[test]
    fn test_extension_token() {
        assert_eq!(extension_token(Path::new("/x/Photo.JPEG")).as_deref(), Some("jpeg"));
        assert_eq!(extension_token(Path::new("/x/noext")), None);
        assert_eq!(extension_token(Path::new("/x/trailing.")), None);
    }

    #[test]
    fn test_status_cache_probes_once_per_mode() {
        let tools = FakeTools::with(&["jpegtran", "pngquant"]);
        let cache = EngineStatusCache::new();

        let lossless = cache.get(&tools, true);
        assert_eq!(lossless.jpeg, EngineId::Jpegtran);
        assert_eq!(lossless.png, EngineId::Builtin);

        let lossy = cache.get(&tools, false);
        assert_eq!(lossy.jpeg, EngineId::Builtin);
        assert_eq!(lossy.png, EngineId::Pngquant);
        assert_eq!(lossy.get(ImageFormatKind::Webp), EngineId::Builtin);

        // A different lookup does not change a filled snapshot.
        let none = FakeTools::default();
        assert_eq!(cache.get(&none, true).jpeg, EngineId::Jpegtran);
    }

    #[test]
    fn test_open_image_reports_decoder_message() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"\x89PNG\r\n\x1a\nnot really").unwrap();
        let err = open_image(&path, ImageFormat::Png).unwrap_err();
        assert!(matches!(err, CompressError::Decode(_)));
        assert!(err.to_string().contains("broken.png"));
    }
}
