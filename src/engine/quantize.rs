//! Palette reduction for the built-in lossy PNG and GIF paths.
//!
//! Sources with an alpha channel go through libimagequant, which keeps alpha
//! in the palette. Sources without one use a median cut that gives the same
//! palette for the same pixels on every run.

use crate::error::{CompressError, Result};
use image::{ColorType, RgbaImage};
use imagequant::{Attributes, Image as LiqImage, RGBA};
use std::collections::HashMap;
use std::io::Write;

/// An indexed image: one palette index per pixel, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quantized {
    pub width: u32,
    pub height: u32,
    pub palette: Vec<[u8; 4]>,
    pub indices: Vec<u8>,
}

impl Quantized {
    pub fn has_alpha(&self) -> bool {
        self.palette.iter().any(|c| c[3] < u8::MAX)
    }

    /// Expands the palette back to full RGBA pixels.
    pub fn to_rgba_image(&self) -> Result<RgbaImage> {
        let mut raw = Vec::with_capacity(self.indices.len() * 4);
        for &index in &self.indices {
            let color = self
                .palette
                .get(index as usize)
                .ok_or_else(|| CompressError::encode(format!("palette index {} out of range", index)))?;
            raw.extend_from_slice(color);
        }
        RgbaImage::from_raw(self.width, self.height, raw)
            .ok_or_else(|| CompressError::encode("indexed image does not match its dimensions"))
    }

    /// Writes an 8-bit indexed PNG with a `tRNS` chunk when the palette has alpha.
    pub fn write_png<W: Write>(&self, writer: W) -> Result<()> {
        let mut encoder = ::png::Encoder::new(writer, self.width, self.height);
        encoder.set_color(::png::ColorType::Indexed);
        encoder.set_depth(::png::BitDepth::Eight);
        encoder.set_compression(::png::Compression::Best);
        encoder.set_palette(
            self.palette
                .iter()
                .flat_map(|c| [c[0], c[1], c[2]])
                .collect::<Vec<u8>>(),
        );
        if self.has_alpha() {
            encoder.set_trns(self.palette.iter().map(|c| c[3]).collect::<Vec<u8>>());
        }

        let mut writer = encoder.write_header().map_err(CompressError::encode)?;
        writer
            .write_image_data(&self.indices)
            .map_err(CompressError::encode)?;
        writer.finish().map_err(CompressError::encode)?;
        Ok(())
    }
}

/// Palette builder for a lossy indexed output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantizer {
    /// libimagequant, keeps alpha in the palette
    Imagequant,
    /// Deterministic median cut over RGB
    MedianCut,
}

impl Quantizer {
    /// Picks by the source's channel layout: any alpha channel goes to
    /// libimagequant, even when every pixel happens to be opaque.
    pub fn for_color(color: ColorType) -> Self {
        if color.has_alpha() {
            Self::Imagequant
        } else {
            Self::MedianCut
        }
    }

    /// Reduces `image` to at most `max_colors` (clamped to 2..=256).
    pub fn quantize(self, image: &RgbaImage, max_colors: u32) -> Result<Quantized> {
        let max_colors = max_colors.clamp(2, 256);
        match self {
            Self::Imagequant => quantize_with_alpha(image, max_colors),
            Self::MedianCut => median_cut(image, max_colors),
        }
    }
}

/// Adaptive quantization through libimagequant.
pub fn quantize_with_alpha(image: &RgbaImage, max_colors: u32) -> Result<Quantized> {
    let (width, height) = image.dimensions();

    let mut attr = Attributes::new();
    attr.set_max_colors(max_colors).map_err(CompressError::encode)?;
    attr.set_speed(3).map_err(CompressError::encode)?;

    let pixels: Vec<RGBA> = image
        .pixels()
        .map(|p| RGBA::new(p[0], p[1], p[2], p[3]))
        .collect();
    let mut liq_image = LiqImage::new(&attr, pixels.as_slice(), width as usize, height as usize, 0.0)
        .map_err(CompressError::encode)?;
    let mut res = attr.quantize(&mut liq_image).map_err(CompressError::encode)?;
    res.set_dithering_level(1.0).map_err(CompressError::encode)?;
    let (palette, indices) = res.remapped(&mut liq_image).map_err(CompressError::encode)?;

    Ok(Quantized {
        width,
        height,
        palette: palette.iter().map(|c| [c.r, c.g, c.b, c.a]).collect(),
        indices,
    })
}

type Rgb = [u8; 3];

/// Box of histogram entries awaiting a split.
struct ColorBox {
    entries: Vec<(Rgb, u32)>,
}

impl ColorBox {
    /// Channel with the widest spread and that spread.
    fn widest_channel(&self) -> (usize, u8) {
        (0..3)
            .map(|ch| {
                let (lo, hi) = self
                    .entries
                    .iter()
                    .fold((u8::MAX, u8::MIN), |(lo, hi), (c, _)| (lo.min(c[ch]), hi.max(c[ch])));
                (ch, hi.saturating_sub(lo))
            })
            .fold((0, 0), |best, cur| if cur.1 > best.1 { cur } else { best })
    }

    fn split(mut self) -> (ColorBox, ColorBox) {
        let (channel, _) = self.widest_channel();
        self.entries.sort_by_key(|(c, _)| (c[channel], *c));

        let total: u64 = self.entries.iter().map(|(_, n)| *n as u64).sum();
        let mut running = 0u64;
        let mut cut = self.entries.len() - 1;
        for (i, (_, n)) in self.entries.iter().enumerate() {
            running += *n as u64;
            if running * 2 >= total {
                cut = i + 1;
                break;
            }
        }
        let cut = cut.clamp(1, self.entries.len() - 1);

        let upper = self.entries.split_off(cut);
        (self, ColorBox { entries: upper })
    }

    fn average(&self) -> [u8; 4] {
        let mut sum = [0u64; 3];
        let mut weight = 0u64;
        for (color, n) in &self.entries {
            for ch in 0..3 {
                sum[ch] += color[ch] as u64 * *n as u64;
            }
            weight += *n as u64;
        }
        let weight = weight.max(1);
        let avg = |ch: usize| ((sum[ch] + weight / 2) / weight) as u8;
        [avg(0), avg(1), avg(2), u8::MAX]
    }
}

/// Deterministic median cut for fully opaque images.
pub fn median_cut(image: &RgbaImage, max_colors: u32) -> Result<Quantized> {
    let (width, height) = image.dimensions();

    let mut histogram: HashMap<Rgb, u32> = HashMap::new();
    for p in image.pixels() {
        *histogram.entry([p[0], p[1], p[2]]).or_insert(0) += 1;
    }
    let mut entries: Vec<(Rgb, u32)> = histogram.into_iter().collect();
    entries.sort_unstable();

    let palette: Vec<[u8; 4]> = if entries.len() <= max_colors as usize {
        entries.iter().map(|(c, _)| [c[0], c[1], c[2], u8::MAX]).collect()
    } else {
        let mut boxes = vec![ColorBox { entries }];
        while boxes.len() < max_colors as usize {
            let candidate = boxes
                .iter()
                .enumerate()
                .filter(|(_, b)| b.entries.len() > 1)
                .map(|(i, b)| (i, b.widest_channel().1))
                .fold(None, |best: Option<(usize, u8)>, cur| match best {
                    Some(b) if b.1 >= cur.1 => Some(b),
                    _ => Some(cur),
                });
            let Some((index, _)) = candidate else { break };
            let (lower, upper) = boxes.swap_remove(index).split();
            boxes.push(lower);
            boxes.push(upper);
        }
        let mut palette: Vec<[u8; 4]> = boxes.iter().map(ColorBox::average).collect();
        palette.sort_unstable();
        palette.dedup();
        palette
    };

    let mut lookup: HashMap<Rgb, u8> = HashMap::new();
    let indices = image
        .pixels()
        .map(|p| {
            let color = [p[0], p[1], p[2]];
            *lookup
                .entry(color)
                .or_insert_with(|| nearest(&palette, color))
        })
        .collect();

    Ok(Quantized {
        width,
        height,
        palette,
        indices,
    })
}

fn nearest(palette: &[[u8; 4]], color: Rgb) -> u8 {
    let distance = |entry: &[u8; 4]| -> u32 {
        (0..3)
            .map(|ch| {
                let d = entry[ch] as i32 - color[ch] as i32;
                (d * d) as u32
            })
            .sum()
    };
    palette
        .iter()
        .enumerate()
        .min_by_key(|(_, entry)| distance(entry))
        .map(|(i, _)| i as u8)
        .unwrap_or(0)
}
