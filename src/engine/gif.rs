//! GIF engine: gifsicle, then a frame-by-frame re-encode.
//!
//! The built-in path keeps every frame's delay and the source loop count.
//! Lossy mode re-quantizes each frame on its own.

use super::quantize::Quantizer;
use super::{chain_or_builtin, write_output, EngineContext, EngineId, EngineJob, ImageFormatKind};
use crate::config::CompressionRequest;
use crate::error::{CompressError, Result};
use crate::quality::{encoder_quality, gif_palette_size};
use image::codecs::gif::{GifDecoder, GifEncoder, Repeat};
use image::{AnimationDecoder, Frame};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::debug;

/// Encoder speed handed to the GIF writer (1 slowest, 30 fastest).
const ENCODE_SPEED: i32 = 10;

pub fn compress(job: &EngineJob<'_>, ctx: &EngineContext<'_>) -> Result<EngineId> {
    chain_or_builtin(ImageFormatKind::Gif, job, ctx, |job| {
        let bytes = reencode(job.source, job.request)?;
        write_output(job, &bytes)
    })
}

/// Loop count stored in the source's NETSCAPE extension.
///
/// `None` when the file carries no loop extension.
pub fn read_loop_count(source: &Path) -> Result<Option<Repeat>> {
    let file = BufReader::new(File::open(source)?);
    let mut options = ::gif::DecodeOptions::new();
    options.set_color_output(::gif::ColorOutput::Indexed);
    let mut decoder = options.read_info(file).map_err(CompressError::decode)?;
    // The extension may follow the global header or sit after the first frame.
    decoder.read_next_frame().map_err(CompressError::decode)?;

    Ok(match decoder.repeat() {
        ::gif::Repeat::Infinite => Some(Repeat::Infinite),
        ::gif::Repeat::Finite(0) => None,
        ::gif::Repeat::Finite(n) => Some(Repeat::Finite(n)),
    })
}

pub fn reencode(source: &Path, request: &CompressionRequest) -> Result<Vec<u8>> {
    let repeat = read_loop_count(source)?;
    let decoder = GifDecoder::new(BufReader::new(File::open(source)?))
        .map_err(|e| CompressError::decode(format!("{}: {}", source.display(), e)))?;
    let frames = decoder
        .into_frames()
        .collect_frames()
        .map_err(|e| CompressError::decode(format!("{}: {}", source.display(), e)))?;
    debug!("{}: {} frame(s), loop {:?}", source.display(), frames.len(), repeat);

    let frames = if request.lossless {
        frames
    } else {
        let quality = encoder_quality(request.quality, request.profile);
        let colors = gif_palette_size(request.profile, quality);
        frames
            .into_iter()
            .map(|frame| requantize(frame, colors))
            .collect::<Result<Vec<_>>>()?
    };

    encode_frames(frames, repeat)
}

fn requantize(frame: Frame, colors: u32) -> Result<Frame> {
    let (left, top, delay) = (frame.left(), frame.top(), frame.delay());
    // Decoded frames are always RGBA; transparency must survive.
    let buffer = Quantizer::Imagequant
        .quantize(frame.buffer(), colors)?
        .to_rgba_image()?;
    Ok(Frame::from_parts(buffer, left, top, delay))
}

pub fn encode_frames(frames: Vec<Frame>, repeat: Option<Repeat>) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    {
        let mut encoder = GifEncoder::new_with_speed(&mut bytes, ENCODE_SPEED);
        if let Some(repeat) = repeat {
            encoder.set_repeat(repeat)?;
        }
        encoder.encode_frames(frames)?;
    }
    Ok(bytes)
}
