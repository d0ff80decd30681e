//! External tool strategies.
//!
//! Each variant names one command-line tool tier. The variant decides which
//! executable names to look up and how to build its argv; running it and
//! judging success is the chain runner's job.

use super::{EngineId, EngineJob};
use crate::args;
use crate::quality::{
    encoder_quality, gif_lossy_distance, gif_palette_size, quantization_range, MIN_ADJUSTED_QUALITY,
};
use std::ffi::OsString;
use std::path::Path;

pub const JPEGTRAN: &[&str] = &["jpegtran"];
pub const CJPEG: &[&str] = &["cjpeg", "mozjpeg"];
pub const PNG_OPTIMIZERS: &[&str] = &["oxipng", "optipng"];
pub const PNGQUANT: &[&str] = &["pngquant"];
pub const GIFSICLE: &[&str] = &["gifsicle"];
pub const CWEBP: &[&str] = &["cwebp"];

/// One external tier of a format's fallback chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Lossless JPEG re-encode
    Jpegtran,
    /// mozjpeg's `cjpeg` at the adjusted quality
    Cjpeg,
    /// oxipng or optipng recompressing straight into the destination
    PngOptimizer,
    /// Palette quantization within the profile's quality window
    Pngquant,
    /// gifsicle, lossy flags only in lossy mode
    Gifsicle,
    /// cwebp, lossless or at the adjusted quality
    Cwebp,
}

impl Strategy {
    pub fn tool_names(self) -> &'static [&'static str] {
        match self {
            Self::Jpegtran => JPEGTRAN,
            Self::Cjpeg => CJPEG,
            Self::PngOptimizer => PNG_OPTIMIZERS,
            Self::Pngquant => PNGQUANT,
            Self::Gifsicle => GIFSICLE,
            Self::Cwebp => CWEBP,
        }
    }

    /// Engine recorded when this tier wins with the given executable.
    pub fn engine_id(self, tool: &Path) -> EngineId {
        match self {
            Self::Jpegtran => EngineId::Jpegtran,
            Self::Cjpeg => EngineId::Mozjpeg,
            Self::PngOptimizer => PngOptimizerKind::from_tool(tool).engine_id(),
            Self::Pngquant => EngineId::Pngquant,
            Self::Gifsicle => EngineId::Gifsicle,
            Self::Cwebp => EngineId::Cwebp,
        }
    }

    pub fn build_args(self, tool: &Path, job: &EngineJob<'_>) -> Vec<OsString> {
        let request = job.request;
        let (source, destination) = (job.source, job.destination);

        match self {
            Self::Jpegtran => jpegtran_args(source, destination),
            Self::Cjpeg => {
                let quality = encoder_quality(request.quality, request.profile);
                args![
                    "-quality",
                    quality.to_string(),
                    "-progressive",
                    "-optimize",
                    "-outfile",
                    destination,
                    source,
                ]
            }
            Self::PngOptimizer => PngOptimizerKind::from_tool(tool).args(source, destination),
            Self::Pngquant => {
                let quality = encoder_quality(request.quality, request.profile).max(MIN_ADJUSTED_QUALITY);
                let range = quantization_range(request.profile, quality);
                args![
                    "--quality",
                    format!("{}-{}", range.min, range.max),
                    "--speed",
                    range.speed.to_string(),
                    "--strip",
                    "--skip-if-larger",
                    "--output",
                    destination,
                    "--force",
                    source,
                ]
            }
            Self::Gifsicle => {
                let mut argv = gifsicle_base_args();
                if !request.lossless {
                    let quality = encoder_quality(request.quality, request.profile);
                    let lossy = gif_lossy_distance(request.profile, quality);
                    let colors = gif_palette_size(request.profile, quality);
                    argv.extend(args!["--lossy", lossy.to_string(), "--colors", colors.to_string()]);
                }
                argv.extend(args![source, "-o", destination]);
                argv
            }
            Self::Cwebp => {
                if request.lossless {
                    args!["-lossless", "-z", "9", "-m", "6", "-metadata", "none", source, "-o", destination]
                } else {
                    let quality = encoder_quality(request.quality, request.profile);
                    args![
                        "-q",
                        quality.to_string(),
                        "-m",
                        "6",
                        "-metadata",
                        "none",
                        source,
                        "-o",
                        destination,
                    ]
                }
            }
        }
    }
}

pub(crate) fn jpegtran_args(source: &Path, destination: &Path) -> Vec<OsString> {
    args![
        "-copy",
        "none",
        "-optimize",
        "-progressive",
        "-outfile",
        destination,
        source,
    ]
}

pub(crate) fn gifsicle_base_args() -> Vec<OsString> {
    args!["-O3", "--no-comments", "--no-names", "--no-extensions"]
}

/// The two PNG optimizers take different flag syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PngOptimizerKind {
    Oxipng,
    Optipng,
}

impl PngOptimizerKind {
    /// Identity comes from the resolved executable's file name.
    pub fn from_tool(tool: &Path) -> Self {
        let name = tool
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if name.contains("oxipng") {
            Self::Oxipng
        } else {
            Self::Optipng
        }
    }

    pub fn engine_id(self) -> EngineId {
        match self {
            Self::Oxipng => EngineId::Oxipng,
            Self::Optipng => EngineId::Optipng,
        }
    }

    pub fn args(self, source: &Path, destination: &Path) -> Vec<OsString> {
        match self {
            Self::Oxipng => args!["-o", "4", "--strip", "all", "--out", destination, source],
            Self::Optipng => args!["-o7", "-strip", "all", "-out", destination, source],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CompressionRequest, QualityProfile};
    use std::path::PathBuf;

    fn strings(args: Vec<OsString>) -> Vec<String> {
        args.into_iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    fn job<'a>(request: &'a CompressionRequest, source: &'a Path, destination: &'a Path) -> EngineJob<'a> {
        EngineJob {
            source,
            destination,
            request,
        }
    }

    #[test]
    fn test_cjpeg_uses_adjusted_quality() {
        let request = CompressionRequest {
            quality: 80,
            profile: QualityProfile::Strong,
            ..Default::default()
        };
        let (src, dst) = (PathBuf::from("in.jpg"), PathBuf::from("out.jpg"));
        let argv = strings(Strategy::Cjpeg.build_args(Path::new("cjpeg"), &job(&request, &src, &dst)));
        assert_eq!(
            argv,
            ["-quality", "70", "-progressive", "-optimize", "-outfile", "out.jpg", "in.jpg"]
        );
    }

    #[test]
    fn test_pngquant_quality_window() {
        let request = CompressionRequest {
            quality: 80,
            profile: QualityProfile::Balanced,
            ..Default::default()
        };
        let (src, dst) = (PathBuf::from("a.png"), PathBuf::from("b.png"));
        let argv = strings(Strategy::Pngquant.build_args(Path::new("pngquant"), &job(&request, &src, &dst)));
        // adjusted quality 76, balanced window 15
        assert_eq!(&argv[..4], ["--quality", "61-76", "--speed", "2"]);
        assert!(argv.contains(&"--skip-if-larger".to_string()));
        assert_eq!(argv.last().map(String::as_str), Some("a.png"));
    }

    #[test]
    fn test_gifsicle_lossless_has_no_lossy_flags() {
        let request = CompressionRequest {
            lossless: true,
            ..Default::default()
        };
        let (src, dst) = (PathBuf::from("a.gif"), PathBuf::from("b.gif"));
        let argv = strings(Strategy::Gifsicle.build_args(Path::new("gifsicle"), &job(&request, &src, &dst)));
        assert_eq!(
            argv,
            ["-O3", "--no-comments", "--no-names", "--no-extensions", "a.gif", "-o", "b.gif"]
        );
    }

    #[test]
    fn test_gifsicle_lossy_flags() {
        let request = CompressionRequest {
            quality: 70,
            profile: QualityProfile::High,
            ..Default::default()
        };
        let (src, dst) = (PathBuf::from("a.gif"), PathBuf::from("b.gif"));
        let argv = strings(Strategy::Gifsicle.build_args(Path::new("gifsicle"), &job(&request, &src, &dst)));
        let lossy = argv.iter().position(|a| a == "--lossy").unwrap();
        assert_eq!(argv[lossy + 1], "60");
        let colors = argv.iter().position(|a| a == "--colors").unwrap();
        assert_eq!(argv[colors + 1], "179");
    }

    #[test]
    fn test_png_optimizer_identity_by_executable_name() {
        assert_eq!(
            PngOptimizerKind::from_tool(Path::new("/opt/vendor/oxipng.exe")),
            PngOptimizerKind::Oxipng
        );
        assert_eq!(
            PngOptimizerKind::from_tool(Path::new("/usr/bin/optipng")),
            PngOptimizerKind::Optipng
        );

        let argv = strings(PngOptimizerKind::Oxipng.args(Path::new("s.png"), Path::new("d.png")));
        assert_eq!(argv, ["-o", "4", "--strip", "all", "--out", "d.png", "s.png"]);
        let argv = strings(PngOptimizerKind::Optipng.args(Path::new("s.png"), Path::new("d.png")));
        assert_eq!(argv, ["-o7", "-strip", "all", "-out", "d.png", "s.png"]);
    }

    #[test]
    fn test_cwebp_modes() {
        let (src, dst) = (PathBuf::from("a.webp"), PathBuf::from("b.webp"));
        let lossless = CompressionRequest {
            lossless: true,
            ..Default::default()
        };
        let argv = strings(Strategy::Cwebp.build_args(Path::new("cwebp"), &job(&lossless, &src, &dst)));
        assert_eq!(argv[0], "-lossless");

        let lossy = CompressionRequest::default();
        let argv = strings(Strategy::Cwebp.build_args(Path::new("cwebp"), &job(&lossy, &src, &dst)));
        assert_eq!(&argv[..2], ["-q", "80"]);
    }
}
