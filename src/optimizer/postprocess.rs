//! # Post-Process Optimizer
//!
//! Secondo passaggio lossless sull'output prodotto dal codec integrato.
//!
//! ## Responsabilità:
//! - Sceglie il tool di ottimizzazione per formato (nessuno per WebP)
//! - Scrive su un file temporaneo accanto alla destinazione
//! - Sostituisce l'output solo se il tool termina con successo
//!
//! Il nome temporaneo deriva dalla destinazione finale, quindi due
//! compressioni verso destinazioni diverse non collidono mai.

use crate::args;
use crate::engine::strategy::{gifsicle_base_args, jpegtran_args, Strategy, GIFSICLE, JPEGTRAN, PNG_OPTIMIZERS};
use crate::engine::{EngineContext, EngineId, ImageFormatKind, PngOptimizerKind};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Runs the format's optimizer over an already written output.
pub struct PostProcessOptimizer<'a> {
    ctx: EngineContext<'a>,
}

impl<'a> PostProcessOptimizer<'a> {
    pub fn new(ctx: EngineContext<'a>) -> Self {
        Self { ctx }
    }

    /// Whether a post-pass follows a builtin encode for this format and mode.
    ///
    /// When the optimizer is already a tier of the primary chain, the builtin
    /// only won because that tool was missing or failed; it is not run again.
    pub fn applies(kind: ImageFormatKind, lossless: bool) -> bool {
        let tier = match kind {
            ImageFormatKind::Jpeg => Strategy::Jpegtran,
            ImageFormatKind::Png => Strategy::PngOptimizer,
            ImageFormatKind::Gif => Strategy::Gifsicle,
            ImageFormatKind::Webp => return false,
        };
        !kind.chain(lossless).contains(&tier)
    }

    /// Sibling temp file: `<stem>.__opt<.suffix>`.
    pub fn temp_path(output: &Path) -> PathBuf {
        let stem = output
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let suffix = output
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        output.with_file_name(format!("{}.__opt{}", stem, suffix))
    }

    /// Re-optimizes `output` in place.
    ///
    /// Returns the optimizer that replaced the file, or `None` when no tool is
    /// available or it failed; in both cases `output` is left untouched.
    ///
    /// Every format with an optimizer is planned here. The dispatcher only
    /// calls this when [`Self::applies`] holds, so the GIF arm and the lossless
    /// JPEG and PNG cases serve direct callers of `run`.
    pub fn run(&self, kind: ImageFormatKind, output: &Path) -> Option<EngineId> {
        let (tool, engine, args) = self.plan(kind, output)?;
        let temp = Self::temp_path(output);
        if temp.exists() {
            let _ = fs::remove_file(&temp);
        }

        let succeeded = match self.ctx.runner.execute(&tool, &args) {
            Ok(result) if result.success() && temp.exists() => true,
            Ok(result) => {
                debug!(
                    "Post-pass {} exited with {:?}: {}",
                    engine,
                    result.exit_code,
                    String::from_utf8_lossy(&result.stderr).trim()
                );
                false
            }
            Err(e) => {
                debug!("Post-pass {} could not start: {}", engine, e);
                false
            }
        };

        if succeeded {
            match fs::rename(&temp, output) {
                Ok(()) => {
                    debug!("Post-pass {} applied to {}", engine, output.display());
                    return Some(engine);
                }
                Err(e) => warn!("Could not replace {} with post-pass output: {}", output.display(), e),
            }
        }

        if temp.exists() {
            if let Err(e) = fs::remove_file(&temp) {
                warn!("Could not remove {}: {}", temp.display(), e);
            }
        }
        None
    }

    fn plan(&self, kind: ImageFormatKind, output: &Path) -> Option<(PathBuf, EngineId, Vec<OsString>)> {
        let temp = Self::temp_path(output);
        match kind {
            ImageFormatKind::Jpeg => {
                let tool = self.ctx.tools.resolve(JPEGTRAN)?;
                Some((tool, EngineId::Jpegtran, jpegtran_args(output, &temp)))
            }
            ImageFormatKind::Png => {
                let tool = self.ctx.tools.resolve(PNG_OPTIMIZERS)?;
                let optimizer = PngOptimizerKind::from_tool(&tool);
                Some((tool, optimizer.engine_id(), optimizer.args(output, &temp)))
            }
            ImageFormatKind::Gif => {
                let tool = self.ctx.tools.resolve(GIFSICLE)?;
                let mut args = gifsicle_base_args();
                args.extend(args![output, "-o", temp]);
                Some((tool, EngineId::Gifsicle, args))
            }
            ImageFormatKind::Webp => None,
        }
    }
}
