//! WebP engine: cwebp, then libwebp in-process. Output is final; no post-pass.

use super::{chain_or_builtin, open_image, write_output, EngineContext, EngineId, EngineJob, ImageFormatKind};
use crate::config::CompressionRequest;
use crate::error::{CompressError, Result};
use crate::quality::encoder_quality;
use image::DynamicImage;

/// libwebp effort level, matching the `-m 6` passed to cwebp.
const METHOD: i32 = 6;

pub fn compress(job: &EngineJob<'_>, ctx: &EngineContext<'_>) -> Result<EngineId> {
    chain_or_builtin(ImageFormatKind::Webp, job, ctx, |job| {
        let image = open_image(job.source, ImageFormatKind::Webp.image_format())?;
        let bytes = encode(&image, job.request)?;
        write_output(job, &bytes)
    })
}

pub fn encode(image: &DynamicImage, request: &CompressionRequest) -> Result<Vec<u8>> {
    let (width, height) = (image.width(), image.height());

    let mut config = ::webp::WebPConfig::new()
        .map_err(|_| CompressError::encode("failed to create WebPConfig"))?;
    config.method = METHOD;
    if request.lossless {
        config.lossless = 1;
        config.quality = 100.0;
    } else {
        config.quality = encoder_quality(request.quality, request.profile) as f32;
    }

    let memory = if image.color().has_alpha() {
        let rgba = image.to_rgba8();
        ::webp::Encoder::from_rgba(rgba.as_raw(), width, height).encode_advanced(&config)
    } else {
        let rgb = image.to_rgb8();
        ::webp::Encoder::from_rgb(rgb.as_raw(), width, height).encode_advanced(&config)
    }
    .map_err(|e| CompressError::encode(format!("WebP encode failed: {:?}", e)))?;

    Ok(memory.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn sample(alpha: u8) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_fn(24, 16, |x, y| {
            Rgba([(x * 10) as u8, (y * 12) as u8, 77, alpha])
        }))
    }

    #[test]
    fn test_lossless_round_trip_is_exact() {
        let image = sample(200);
        let request = CompressionRequest {
            lossless: true,
            ..Default::default()
        };
        let bytes = encode(&image, &request).unwrap();
        assert_eq!(&bytes[..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WEBP");

        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.to_rgba8(), image.to_rgba8());
    }

    #[test]
    fn test_lossy_encode_keeps_dimensions() {
        let bytes = encode(&sample(255).to_rgb8().into(), &CompressionRequest::default()).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (24, 16));
    }
}
