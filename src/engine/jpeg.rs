//! JPEG engine: jpegtran (lossless) or cjpeg (lossy), then mozjpeg in-process.

use super::{chain_or_builtin, open_image, write_output, EngineContext, EngineId, EngineJob, ImageFormatKind};
use crate::config::CompressionRequest;
use crate::error::{CompressError, Result};
use crate::quality::encoder_quality;
use image::DynamicImage;
use mozjpeg::{ColorSpace, Compress};
use std::panic::{self, AssertUnwindSafe};

pub fn compress(job: &EngineJob<'_>, ctx: &EngineContext<'_>) -> Result<EngineId> {
    chain_or_builtin(ImageFormatKind::Jpeg, job, ctx, |job| {
        let image = open_image(job.source, ImageFormatKind::Jpeg.image_format())?;
        let bytes = encode(&image, job.request)?;
        write_output(job, &bytes)
    })
}

/// Progressive, Huffman-optimized encode.
///
/// Lossless mode encodes at quality 100 without chroma subsampling; it is
/// as close as a DCT re-encode gets, not bit-exact.
pub fn encode(image: &DynamicImage, request: &CompressionRequest) -> Result<Vec<u8>> {
    let rgb = image.to_rgb8();
    let (width, height) = (rgb.width() as usize, rgb.height() as usize);
    let quality = if request.lossless {
        100
    } else {
        encoder_quality(request.quality, request.profile)
    };
    let lossless = request.lossless;

    // libjpeg errors unwind out of mozjpeg
    let result = panic::catch_unwind(AssertUnwindSafe(|| -> std::io::Result<Vec<u8>> {
        let mut comp = Compress::new(ColorSpace::JCS_RGB);
        comp.set_size(width, height);
        comp.set_quality(quality as f32);
        comp.set_progressive_mode();
        comp.set_optimize_coding(true);
        if lossless {
            comp.set_chroma_sampling_pixel_sizes((1, 1), (1, 1));
        }

        let mut writer = comp.start_compress(Vec::new())?;
        writer.write_scanlines(rgb.as_raw())?;
        writer.finish()
    }));

    match result {
        Ok(Ok(bytes)) => Ok(bytes),
        Ok(Err(e)) => Err(CompressError::encode(e)),
        Err(_) => Err(CompressError::encode("mozjpeg aborted the encode")),
    }
}
