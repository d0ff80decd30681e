//! # Quality Policy
//!
//! Pure numeric mapping from `(quality, profile)` to the parameters each
//! tool or built-in codec understands. Quality inputs are clamped to
//! `[1, 100]` before use.

use crate::config::QualityProfile;

/// Floor applied to any profile-adjusted quality.
pub const MIN_ADJUSTED_QUALITY: u8 = 10;
/// Floor applied to profile-adjusted palette sizes.
pub const MIN_PROFILE_COLORS: u32 = 16;
/// Ceiling for the gifsicle lossy distance.
pub const MAX_LOSSY: u32 = 200;
/// Largest palette an indexed PNG or GIF frame can carry.
pub const MAX_PALETTE: u32 = 256;

fn clamp_quality(quality: u8) -> u8 {
    quality.clamp(1, 100)
}

fn scale(value: u32, factor: f64) -> u32 {
    (value as f64 * factor).round() as u32
}

/// Quality after the profile offset. `High` passes the clamped value through.
pub fn adjust_quality(quality: u8, profile: QualityProfile) -> u8 {
    let quality = clamp_quality(quality);
    match profile {
        QualityProfile::High => quality,
        QualityProfile::Balanced => quality.saturating_sub(4).max(MIN_ADJUSTED_QUALITY),
        QualityProfile::Strong => quality.saturating_sub(10).max(MIN_ADJUSTED_QUALITY),
    }
}

/// Palette size after the profile reduction.
pub fn adjust_colors(profile: QualityProfile, colors: u32) -> u32 {
    match profile {
        QualityProfile::High => colors,
        QualityProfile::Balanced => scale(colors, 0.85).max(MIN_PROFILE_COLORS),
        QualityProfile::Strong => scale(colors, 0.70).max(MIN_PROFILE_COLORS),
    }
}

/// gifsicle lossy distance after the profile boost.
pub fn adjust_lossy(profile: QualityProfile, lossy: u32) -> u32 {
    match profile {
        QualityProfile::High => lossy,
        QualityProfile::Balanced => scale(lossy, 1.1).min(MAX_LOSSY),
        QualityProfile::Strong => scale(lossy, 1.4).min(MAX_LOSSY),
    }
}

/// pngquant `--quality min-max` and `--speed` settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuantizationRange {
    pub min: u8,
    pub max: u8,
    pub speed: u8,
}

/// Quantization window below `quality` whose width and speed grow with the profile.
pub fn quantization_range(profile: QualityProfile, quality: u8) -> QuantizationRange {
    let quality = clamp_quality(quality);
    let (width, speed) = match profile {
        QualityProfile::High => (8, 1),
        QualityProfile::Balanced => (15, 2),
        QualityProfile::Strong => (25, 3),
    };
    QuantizationRange {
        min: quality.saturating_sub(width).max(MIN_ADJUSTED_QUALITY),
        max: quality,
        speed,
    }
}

fn colors_for_quality(quality: u8) -> u32 {
    (MAX_PALETTE as f64 * clamp_quality(quality) as f64 / 100.0).round() as u32
}

/// Quality handed to encoders: the profile-adjusted value clamped to `[1, 100]`.
pub fn encoder_quality(quality: u8, profile: QualityProfile) -> u8 {
    clamp_quality(adjust_quality(quality, profile))
}

/// Palette size for the built-in lossy PNG path.
///
/// `quality` is the already profile-adjusted quality; the profile is applied
/// again to the palette size.
pub fn png_palette_size(profile: QualityProfile, quality: u8) -> u32 {
    let colors = colors_for_quality(quality).max(MIN_PROFILE_COLORS).min(MAX_PALETTE);
    adjust_colors(profile, colors).min(MAX_PALETTE)
}

/// gifsicle `--lossy` distance for an adjusted quality.
pub fn gif_lossy_distance(profile: QualityProfile, quality: u8) -> u32 {
    let distance = (100 - clamp_quality(quality) as u32) * 2;
    adjust_lossy(profile, distance)
}

/// Palette size for lossy GIF output, shared by gifsicle and the built-in path.
pub fn gif_palette_size(profile: QualityProfile, quality: u8) -> u32 {
    let colors = colors_for_quality(quality).max(32).min(MAX_PALETTE);
    adjust_colors(profile, colors).min(MAX_PALETTE)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROFILES: [QualityProfile; 3] = [
        QualityProfile::High,
        QualityProfile::Balanced,
        QualityProfile::Strong,
    ];

    #[test]
    fn test_adjust_quality_ordering_holds_for_all_inputs() {
        for quality in 1..=100u8 {
            let high = adjust_quality(quality, QualityProfile::High);
            let balanced = adjust_quality(quality, QualityProfile::Balanced);
            let strong = adjust_quality(quality, QualityProfile::Strong);

            assert_eq!(high, quality);
            assert!(strong <= balanced, "q={}: {} > {}", quality, strong, balanced);
            assert!(balanced <= high || balanced == MIN_ADJUSTED_QUALITY);
            assert!((10..=100).contains(&balanced));
            assert!((10..=100).contains(&strong));
        }
    }

    #[test]
    fn test_adjust_quality_values() {
        assert_eq!(adjust_quality(80, QualityProfile::Balanced), 76);
        assert_eq!(adjust_quality(80, QualityProfile::Strong), 70);
        assert_eq!(adjust_quality(12, QualityProfile::Strong), 10);
        assert_eq!(adjust_quality(0, QualityProfile::High), 1);
        assert_eq!(adjust_quality(255, QualityProfile::High), 100);
    }

    #[test]
    fn test_adjust_colors() {
        assert_eq!(adjust_colors(QualityProfile::High, 200), 200);
        assert_eq!(adjust_colors(QualityProfile::Balanced, 200), 170);
        assert_eq!(adjust_colors(QualityProfile::Strong, 200), 140);
        assert_eq!(adjust_colors(QualityProfile::Strong, 20), 16);
    }

    #[test]
    fn test_adjust_lossy() {
        assert_eq!(adjust_lossy(QualityProfile::High, 40), 40);
        assert_eq!(adjust_lossy(QualityProfile::Balanced, 40), 44);
        assert_eq!(adjust_lossy(QualityProfile::Strong, 40), 56);
        assert_eq!(adjust_lossy(QualityProfile::Strong, 180), MAX_LOSSY);
    }

    #[test]
    fn test_quantization_range() {
        assert_eq!(
            quantization_range(QualityProfile::High, 80),
            QuantizationRange { min: 72, max: 80, speed: 1 }
        );
        assert_eq!(
            quantization_range(QualityProfile::Balanced, 80),
            QuantizationRange { min: 65, max: 80, speed: 2 }
        );
        assert_eq!(
            quantization_range(QualityProfile::Strong, 20),
            QuantizationRange { min: 10, max: 20, speed: 3 }
        );
    }

    #[test]
    fn test_palette_sizes_stay_in_range() {
        for profile in PROFILES {
            for quality in 1..=100u8 {
                let png = png_palette_size(profile, quality);
                let gif = gif_palette_size(profile, quality);
                assert!((MIN_PROFILE_COLORS..=MAX_PALETTE).contains(&png));
                assert!((MIN_PROFILE_COLORS..=MAX_PALETTE).contains(&gif));
                assert!(gif_lossy_distance(profile, quality) <= MAX_LOSSY);
            }
        }
        assert_eq!(png_palette_size(QualityProfile::High, 100), 256);
        assert_eq!(gif_palette_size(QualityProfile::High, 5), 32);
        assert_eq!(gif_lossy_distance(QualityProfile::High, 70), 60);
    }
}
