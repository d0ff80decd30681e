//! PNG engine: oxipng/optipng (lossless) or pngquant (lossy), then the
//! built-in encoder.

use super::quantize::Quantizer;
use super::{chain_or_builtin, open_image, write_output, EngineContext, EngineId, EngineJob, ImageFormatKind};
use crate::config::CompressionRequest;
use crate::error::Result;
use crate::quality::{encoder_quality, png_palette_size};
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{DynamicImage, ImageEncoder};

pub fn compress(job: &EngineJob<'_>, ctx: &EngineContext<'_>) -> Result<EngineId> {
    chain_or_builtin(ImageFormatKind::Png, job, ctx, |job| {
        let image = open_image(job.source, ImageFormatKind::Png.image_format())?;
        let bytes = encode(&image, job.request)?;
        write_output(job, &bytes)
    })
}

pub fn encode(image: &DynamicImage, request: &CompressionRequest) -> Result<Vec<u8>> {
    if request.lossless {
        encode_lossless(image)
    } else {
        let quality = encoder_quality(request.quality, request.profile);
        encode_indexed(image, png_palette_size(request.profile, quality))
    }
}

/// Best zlib level with adaptive filtering; ancillary chunks are not written.
pub fn encode_lossless(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    let encoder = PngEncoder::new_with_quality(&mut bytes, CompressionType::Best, FilterType::Adaptive);
    encoder.write_image(image.as_bytes(), image.width(), image.height(), image.color())?;
    Ok(bytes)
}

/// Palette PNG with at most `colors` entries.
pub fn encode_indexed(image: &DynamicImage, colors: u32) -> Result<Vec<u8>> {
    let quantized = Quantizer::for_color(image.color()).quantize(&image.to_rgba8(), colors)?;
    let mut bytes = Vec::new();
    quantized.write_png(&mut bytes)?;
    Ok(bytes)
}
