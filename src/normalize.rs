//! Turns logo references into small, palette-compressed badge rasters.
//!
//! Logos are decoded at twice their display height so they stay sharp on
//! high-density screens; the stored `Raster` reports the halved size.

use std::path::PathBuf;

use image::imageops::{self, FilterType};
use image::RgbaImage;
use resvg::{tiny_skia, usvg};

use crate::error::NormalizeError;
use crate::model::{Raster, Record};
use crate::quantize::Quantizer;

/// Oversampling applied while decoding, as a shift: 1 means 2x.
pub const DENSITY_SHIFT: u32 = 1;

/// Widest width:height ratio accepted before resizing.
pub const MAX_ASPECT: u32 = 20;

pub struct Normalizer {
    client: reqwest::Client,
    public_dir: PathBuf,
    quantizer: Quantizer,
}

impl Normalizer {
    /// `public_dir` is the root that relative logo paths are read from.
    pub fn new(client: reqwest::Client, public_dir: impl Into<PathBuf>, quantizer: Quantizer) -> Self {
        Self {
            client,
            public_dir: public_dir.into(),
            quantizer,
        }
    }

    /// Fetches or reads `record.logo` and rasterizes it at `height`.
    pub async fn normalize(&self, record: &Record, height: u32, crop: bool) -> Result<Raster, NormalizeError> {
        let bytes = self.load(&record.logo).await?;
        let logo = record.logo.clone();
        let quantizer = self.quantizer;
        let raster = tokio::task::spawn_blocking(move || rasterize(&logo, &bytes, height, crop, quantizer))
            .await
            .map_err(|e| NormalizeError::Task {
                logo: record.logo.clone(),
                reason: e.to_string(),
            })??;
        Ok(raster)
    }

    async fn load(&self, logo: &str) -> Result<Vec<u8>, NormalizeError> {
        if is_remote(logo) {
            tracing::info!(logo, "fetching logo");
            let response = self
                .client
                .get(logo)
                .send()
                .await
                .map_err(|source| NormalizeError::Fetch {
                    logo: logo.to_string(),
                    source,
                })?;
            let status = response.status();
            if !status.is_success() {
                return Err(NormalizeError::Status {
                    logo: logo.to_string(),
                    status,
                });
            }
            let bytes = response.bytes().await.map_err(|source| NormalizeError::Fetch {
                logo: logo.to_string(),
                source,
            })?;
            Ok(bytes.to_vec())
        } else {
            let path = self.public_dir.join(logo.trim_start_matches('/'));
            tracing::info!(path = %path.display(), "reading logo");
            tokio::fs::read(&path)
                .await
                .map_err(|source| NormalizeError::Read { path, source })
        }
    }
}

pub fn is_remote(logo: &str) -> bool {
    let lower = logo.get(..8).unwrap_or(logo).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Decodes `bytes`, scales them to `2 * height` pixels tall, optionally
/// center-crops a square, and compresses the result.
pub fn rasterize(
    logo: &str,
    bytes: &[u8],
    height: u32,
    crop: bool,
    quantizer: Quantizer,
) -> Result<Raster, NormalizeError> {
    let target = height << DENSITY_SHIFT;
    let mut img = if looks_like_svg(bytes) {
        render_svg(logo, bytes, target)?
    } else {
        decode_scaled(logo, bytes, target)?
    };

    if crop && img.width() > target {
        let x = (img.width() - target) / 2;
        img = imageops::crop_imm(&img, x, 0, target, target).to_image();
    }

    let encoded = quantizer.encode(&img)?;
    tracing::info!(
        logo,
        from = encoded.truecolor_len,
        to = encoded.png.len(),
        quantized = encoded.quantized,
        quality = encoded.quality,
        "minimized logo"
    );
    Ok(Raster {
        width: img.width() >> DENSITY_SHIFT,
        height: img.height() >> DENSITY_SHIFT,
        png: encoded.png,
    })
}

fn looks_like_svg(bytes: &[u8]) -> bool {
    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(1024)]);
    let head = head.trim_start_matches('\u{feff}').trim_start();
    head.starts_with('<') && head.contains("<svg")
}

fn decode_scaled(logo: &str, bytes: &[u8], target: u32) -> Result<RgbaImage, NormalizeError> {
    let img = image::load_from_memory(bytes).map_err(|source| NormalizeError::Decode {
        logo: logo.to_string(),
        source,
    })?;
    if img.width() == 0 || img.height() == 0 {
        return Err(NormalizeError::Empty(logo.to_string()));
    }
    check_aspect(logo, img.width(), img.height())?;
    let (w, h) = (u64::from(img.width()), u64::from(img.height()));
    let width = ((w * u64::from(target) + h / 2) / h).max(1);
    let width = u32::try_from(width).map_err(|_| NormalizeError::Empty(logo.to_string()))?;
    Ok(img.resize_exact(width, target, FilterType::Lanczos3).to_rgba8())
}

fn check_aspect(logo: &str, width: u32, height: u32) -> Result<(), NormalizeError> {
    if u64::from(width) > u64::from(height) * u64::from(MAX_ASPECT) {
        return Err(NormalizeError::TooWide {
            logo: logo.to_string(),
            width,
            height,
            max: MAX_ASPECT,
        });
    }
    Ok(())
}

fn render_svg(logo: &str, bytes: &[u8], target: u32) -> Result<RgbaImage, NormalizeError> {
    let tree = usvg::Tree::from_data(bytes, &usvg::Options::default()).map_err(|source| NormalizeError::Svg {
        logo: logo.to_string(),
        source,
    })?;
    let size = tree.size();
    if size.width() <= 0.0 || size.height() <= 0.0 {
        return Err(NormalizeError::Empty(logo.to_string()));
    }
    check_aspect(logo, size.width().ceil() as u32, size.height().floor().max(1.0) as u32)?;
    let scale = target as f32 / size.height();
    let width = (size.width() * scale).round().max(1.0) as u32;
    let mut pixmap =
        tiny_skia::Pixmap::new(width, target).ok_or_else(|| NormalizeError::Empty(logo.to_string()))?;
    resvg::render(&tree, tiny_skia::Transform::from_scale(scale, scale), &mut pixmap.as_mut());

    // tiny-skia stores premultiplied alpha.
    let mut data = pixmap.take();
    for px in data.chunks_exact_mut(4) {
        let a = u16::from(px[3]);
        if a > 0 && a < 255 {
            for c in &mut px[..3] {
                *c = ((u16::from(*c) * 255 + a / 2) / a).min(255) as u8;
            }
        }
    }
    RgbaImage::from_raw(width, target, data).ok_or_else(|| NormalizeError::Empty(logo.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba};
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    fn quantizer() -> Quantizer {
        Quantizer::new(128, 65, 80)
    }

    fn png_bytes(img: &RgbaImage) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    fn solid(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
        png_bytes(&RgbaImage::from_pixel(width, height, Rgba(color)))
    }

    fn record(logo: &str) -> Record {
        Record {
            name: "Acme".to_string(),
            logo: logo.to_string(),
            link: "https://acme.test".to_string(),
            weight: 10.0,
        }
    }

    #[test]
    fn scales_to_double_height_and_halves() {
        let raster = rasterize("wide.png", &solid(100, 50, [0, 128, 0, 255]), 32, false, quantizer()).unwrap();
        assert_eq!((raster.width, raster.height), (64, 32));

        let decoded = image::load_from_memory(&raster.png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (128, 64));
    }

    #[test]
    fn crop_takes_the_center_square() {
        let src = RgbaImage::from_fn(200, 50, |x, _| {
            if (75..125).contains(&x) {
                Rgba([0, 255, 0, 255])
            } else {
                Rgba([255, 0, 0, 255])
            }
        });
        let raster = rasterize("banner.png", &png_bytes(&src), 32, true, quantizer()).unwrap();
        assert_eq!((raster.width, raster.height), (32, 32));

        let decoded = image::load_from_memory(&raster.png).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (64, 64));
        let center = decoded.get_pixel(32, 32);
        assert!(center[1] > 200 && center[0] < 50, "center was {center:?}");
    }

    #[test]
    fn narrow_logos_are_not_cropped() {
        let raster = rasterize("tall.png", &solid(20, 50, [9, 9, 9, 255]), 32, true, quantizer()).unwrap();
        // 20 * 64 / 50 rounds to 26.
        assert_eq!((raster.width, raster.height), (13, 32));
    }

    #[test]
    fn renders_svg_logos() {
        let svg = br##"<?xml version="1.0"?>
<svg xmlns="http://www.w3.org/2000/svg" width="40" height="20"><rect width="40" height="20" fill="#ff0000"/></svg>"##;
        let raster = rasterize("logo.svg", svg, 32, false, quantizer()).unwrap();
        assert_eq!((raster.width, raster.height), (64, 32));
        let decoded = image::load_from_memory(&raster.png).unwrap().to_rgba8();
        assert_eq!(decoded.get_pixel(64, 32), &Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn rejects_extreme_aspect_ratios() {
        let err = rasterize("strip.png", &solid(2000, 10, [1, 2, 3, 255]), 32, false, quantizer()).unwrap_err();
        assert!(matches!(
            err,
            NormalizeError::TooWide { width: 2000, height: 10, max: MAX_ASPECT, .. }
        ));

        let svg = br#"<svg xmlns="http://www.w3.org/2000/svg" width="5000" height="2"><rect width="5000" height="2"/></svg>"#;
        let err = rasterize("strip.svg", svg, 32, false, quantizer()).unwrap_err();
        assert!(matches!(err, NormalizeError::TooWide { .. }));

        let raster = rasterize("banner.png", &solid(200, 10, [1, 2, 3, 255]), 32, false, quantizer()).unwrap();
        assert_eq!((raster.width, raster.height), (640, 32));
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let err = rasterize("broken.png", b"not an image", 32, false, quantizer()).unwrap_err();
        assert!(matches!(err, NormalizeError::Decode { ref logo, .. } if logo == "broken.png"));
    }

    #[test]
    fn detects_remote_references() {
        assert!(is_remote("https://images.example.com/a.png"));
        assert!(is_remote("HTTP://example.com/a.png"));
        assert!(!is_remote("sponsors/acme.png"));
        assert!(!is_remote("/http/acme.png"));
    }

    #[tokio::test]
    async fn reads_local_logos_relative_to_public_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("sponsors")).unwrap();
        std::fs::write(dir.path().join("sponsors/acme.png"), solid(48, 48, [1, 2, 3, 255])).unwrap();

        let normalizer = Normalizer::new(reqwest::Client::new(), dir.path(), quantizer());
        let raster = normalizer
            .normalize(&record("/sponsors/acme.png"), 36, false)
            .await
            .unwrap();
        assert_eq!((raster.width, raster.height), (36, 36));

        let err = normalizer
            .normalize(&record("sponsors/missing.png"), 36, false)
            .await
            .unwrap_err();
        assert!(matches!(err, NormalizeError::Read { .. }));
    }
}
