//! Palette quantization of badge rasters into indexed PNGs.

use std::collections::HashMap;
use std::io::Cursor;

use color_quant::NeuQuant;
use image::{ImageFormat, RgbaImage};

use crate::error::NormalizeError;

/// NeuQuant sampling factor: 1 is slowest and best, 30 fastest.
const SAMPLE_FACTOR: i32 = 10;

/// Smallest palette tried while trimming toward `max_quality`.
const MIN_COLORS: usize = 16;

/// Palette quantizer with a pngquant-style quality band: below `min_quality`
/// the palette is rejected, above `max_quality` it is shrunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quantizer {
    pub colors: u16,
    pub min_quality: u8,
    pub max_quality: u8,
}

/// Result of compressing one raster.
#[derive(Debug, Clone, PartialEq)]
pub struct Encoded {
    pub png: Vec<u8>,
    /// Size of the plain truecolor PNG the result was compared against.
    pub truecolor_len: usize,
    pub quantized: bool,
    pub quality: u8,
}

struct Palette {
    /// RGBA entries, four bytes each.
    colors: Vec<u8>,
    indices: Vec<u8>,
}

impl Quantizer {
    pub fn new(colors: u16, min_quality: u8, max_quality: u8) -> Self {
        Self {
            colors,
            min_quality,
            max_quality,
        }
    }

    /// Encodes `img` as an indexed PNG when that is smaller than the
    /// truecolor encoding and the palette keeps quality at or above
    /// `min_quality`. Otherwise the truecolor PNG is returned.
    ///
    /// While quality exceeds `max_quality` the palette is halved, down to
    /// `MIN_COLORS`, as long as the smaller one still reaches `max_quality`.
    pub fn encode(&self, img: &RgbaImage) -> Result<Encoded, NormalizeError> {
        let truecolor = encode_truecolor(img)?;
        let mut colors = usize::from(self.colors).min(256);
        let mut palette = build_palette(img, colors);
        let mut quality = palette_quality(img.as_raw(), &palette);

        if quality < self.min_quality {
            tracing::debug!(quality, min = self.min_quality, "palette too lossy, keeping truecolor");
            return Ok(Encoded {
                truecolor_len: truecolor.len(),
                png: truecolor,
                quantized: false,
                quality: 100,
            });
        }

        while quality > self.max_quality && colors > MIN_COLORS {
            let fewer = (colors / 2).max(MIN_COLORS);
            let candidate = build_palette(img, fewer);
            let candidate_quality = palette_quality(img.as_raw(), &candidate);
            if candidate_quality < self.max_quality {
                break;
            }
            colors = fewer;
            palette = candidate;
            quality = candidate_quality;
        }
        tracing::trace!(colors, quality, "palette chosen");

        let indexed = encode_indexed(img.width(), img.height(), &palette)?;
        if indexed.len() >= truecolor.len() {
            return Ok(Encoded {
                truecolor_len: truecolor.len(),
                png: truecolor,
                quantized: false,
                quality: 100,
            });
        }
        Ok(Encoded {
            truecolor_len: truecolor.len(),
            png: indexed,
            quantized: true,
            quality,
        })
    }
}

/// Exact palette when the image fits in `limit` colors, NeuQuant otherwise.
fn build_palette(img: &RgbaImage, limit: usize) -> Palette {
    exact_palette(img, limit).unwrap_or_else(|| {
        // NeuQuant needs at least 100 samples per learning cycle.
        let pixels = img.as_raw().len() / 4;
        let factor = if pixels < 100 * SAMPLE_FACTOR as usize {
            1
        } else {
            SAMPLE_FACTOR
        };
        let nq = NeuQuant::new(factor, limit, img.as_raw());
        let indices = img
            .as_raw()
            .chunks_exact(4)
            .map(|px| nq.index_of(px) as u8)
            .collect();
        Palette {
            colors: nq.color_map_rgba(),
            indices,
        }
    })
}

/// Lossless palette when the image has at most `limit` distinct colors.
/// Fully transparent pixels all collapse to one entry.
fn exact_palette(img: &RgbaImage, limit: usize) -> Option<Palette> {
    let mut lookup: HashMap<[u8; 4], u8> = HashMap::new();
    let mut colors = Vec::new();
    let mut indices = Vec::with_capacity(img.as_raw().len() / 4);
    for px in img.pixels() {
        let key = if px.0[3] == 0 { [0; 4] } else { px.0 };
        let index = match lookup.get(&key) {
            Some(&i) => i,
            None => {
                if lookup.len() == limit {
                    return None;
                }
                let i = lookup.len() as u8;
                lookup.insert(key, i);
                colors.extend_from_slice(&key);
                i
            }
        };
        indices.push(index);
    }
    Some(Palette { colors, indices })
}

/// `min(100, 2 * PSNR)` over all RGBA channels; 100 for a lossless palette.
fn palette_quality(original: &[u8], palette: &Palette) -> u8 {
    let mut sum = 0f64;
    for (px, &index) in original.chunks_exact(4).zip(&palette.indices) {
        let entry = &palette.colors[usize::from(index) * 4..usize::from(index) * 4 + 4];
        if px[3] == 0 && entry[3] == 0 {
            continue;
        }
        for (a, b) in px.iter().zip(entry) {
            let d = f64::from(*a) - f64::from(*b);
            sum += d * d;
        }
    }
    if sum == 0.0 || original.is_empty() {
        return 100;
    }
    let mse = sum / original.len() as f64;
    let psnr = 10.0 * (255.0 * 255.0 / mse).log10();
    (psnr * 2.0).clamp(0.0, 100.0) as u8
}

fn encode_truecolor(img: &RgbaImage) -> Result<Vec<u8>, NormalizeError> {
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png)
        .map_err(|e| NormalizeError::Encode(e.to_string()))?;
    Ok(out.into_inner())
}

fn encode_indexed(width: u32, height: u32, palette: &Palette) -> Result<Vec<u8>, NormalizeError> {
    let mut rgb = Vec::with_capacity(palette.colors.len() / 4 * 3);
    let mut alpha = Vec::with_capacity(palette.colors.len() / 4);
    for entry in palette.colors.chunks_exact(4) {
        rgb.extend_from_slice(&entry[..3]);
        alpha.push(entry[3]);
    }

    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, width, height);
        encoder.set_color(png::ColorType::Indexed);
        encoder.set_depth(png::BitDepth::Eight);
        encoder.set_palette(rgb);
        if alpha.iter().any(|&a| a != 255) {
            encoder.set_trns(alpha);
        }
        encoder.set_compression(png::Compression::Best);
        let mut writer = encoder
            .write_header()
            .map_err(|e| NormalizeError::Encode(e.to_string()))?;
        writer
            .write_image_data(&palette.indices)
            .map_err(|e| NormalizeError::Encode(e.to_string()))?;
        writer
            .finish()
            .map_err(|e| NormalizeError::Encode(e.to_string()))?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;

    fn three_colors(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| match ((x * 31 + y * 17) ^ (x * y)) % 3 {
            0 => Rgba([255, 0, 0, 255]),
            1 => Rgba([0, 0, 255, 128]),
            _ => Rgba([0, 0, 0, 0]),
        })
    }

    #[test]
    fn few_colors_are_kept_exactly() {
        let img = three_colors(128, 128);
        let encoded = Quantizer::new(128, 65, 80).encode(&img).unwrap();
        assert!(encoded.quantized);
        assert_eq!(encoded.quality, 100);

        let decoded = image::load_from_memory(&encoded.png).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (128, 128));
        for (a, b) in decoded.pixels().zip(img.pixels()) {
            if b[3] == 0 {
                assert_eq!(a[3], 0);
            } else {
                assert_eq!(a, b);
            }
        }
    }

    #[test]
    fn gradients_are_reduced_to_the_palette() {
        let img = RgbaImage::from_fn(64, 64, |x, y| Rgba([(x * 4) as u8, (y * 4) as u8, 128, 255]));
        let palette = build_palette(&img, 16);
        assert!(palette.colors.len() <= 16 * 4);
        assert_eq!(palette.indices.len(), 64 * 64);
        assert!(palette.indices.iter().all(|&i| usize::from(i) < 16));
    }

    #[test]
    fn unattainable_quality_keeps_truecolor() {
        let img = RgbaImage::from_fn(64, 64, |x, y| Rgba([(x * 4) as u8, (y * 4) as u8, (x ^ y) as u8, 255]));
        let encoded = Quantizer::new(8, 100, 100).encode(&img).unwrap();
        assert!(!encoded.quantized);
        assert_eq!(encoded.png.len(), encoded.truecolor_len);
        let decoded = image::load_from_memory(&encoded.png).unwrap().to_rgba8();
        assert_eq!(decoded, img);
    }

    #[test]
    fn max_quality_trims_the_palette() {
        let img = RgbaImage::from_fn(64, 64, |x, y| Rgba([(x * 4) as u8, (y * 4) as u8, 128, 255]));
        let encoded = Quantizer::new(256, 0, 30).encode(&img).unwrap();
        assert!(encoded.quantized);
        assert!(encoded.quality >= 30);

        let decoded = image::load_from_memory(&encoded.png).unwrap().to_rgba8();
        let distinct: HashSet<_> = decoded.pixels().collect();
        assert!(distinct.len() <= MIN_COLORS, "{} colors", distinct.len());
    }

    #[test]
    fn exact_palette_gives_up_past_the_limit() {
        let img = RgbaImage::from_fn(9, 1, |x, _| Rgba([(x % 3) as u8 * 100, 0, 0, 255]));
        assert!(exact_palette(&img, 2).is_none());
        let palette = exact_palette(&img, 3).unwrap();
        assert_eq!(palette.colors.len(), 12);
        assert_eq!(palette.indices, [0, 1, 2, 0, 1, 2, 0, 1, 2]);
    }
}
