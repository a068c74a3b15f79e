//! Raster → bytes for each [`OutputFormat`].
//!
//! Formats with alpha (PNG, GIF) first key the sentinel letterbox colour to
//! full transparency. JPEG has no alpha channel, so the sentinel survives as
//! a solid magenta band there.

use super::params::{OutputFormat, Rgb};
use super::raster::Raster;
use crate::error::{Error, Result};
use image::codecs::gif::GifEncoder;
use image::codecs::jpeg::{JpegEncoder, PixelDensity, PixelDensityUnit};
use image::codecs::png::PngEncoder;
use image::{DynamicImage, ExtendedColorType, Rgba, RgbaImage};

/// Encode `raster` as `format`.
pub fn encode(raster: &Raster, format: OutputFormat) -> Result<Vec<u8>> {
    ensure_supported(format)?;

    let keyed;
    let pixels = if format.has_alpha() {
        keyed = key_sentinel(&raster.image);
        &keyed
    } else {
        &raster.image
    };

    let mut buf = Vec::new();
    match format {
        OutputFormat::Png => {
            pixels
                .write_with_encoder(PngEncoder::new(&mut buf))
                .map_err(encode_err)?;
        }
        OutputFormat::Gif => {
            let mut encoder = GifEncoder::new(&mut buf);
            encoder
                .encode(
                    pixels.as_raw(),
                    pixels.width(),
                    pixels.height(),
                    ExtendedColorType::Rgba8,
                )
                .map_err(encode_err)?;
        }
        OutputFormat::Jpeg | OutputFormat::HighQualityJpeg => {
            let rgb = DynamicImage::ImageRgba8(pixels.clone()).into_rgb8();
            let mut encoder = match format.jpeg_quality() {
                Some(q) => JpegEncoder::new_with_quality(&mut buf, q.value()),
                None => JpegEncoder::new(&mut buf),
            };
            if let Some(res) = raster.resolution {
                encoder.set_pixel_density(PixelDensity {
                    density: (res.x_dpi, res.y_dpi),
                    unit: PixelDensityUnit::Inches,
                });
            }
            encoder.encode_image(&rgb).map_err(encode_err)?;
        }
    }
    Ok(buf)
}

/// Fail with [`Error::EncodingUnsupported`] when no codec for `format` is
/// compiled in.
pub fn ensure_supported(format: OutputFormat) -> Result<()> {
    if format.image_format().writing_enabled() {
        Ok(())
    } else {
        Err(Error::EncodingUnsupported(format))
    }
}

/// MIME type for `format`.
pub fn content_type_for(format: OutputFormat) -> &'static str {
    format.content_type()
}

/// Copy of `image` with every exact sentinel pixel made fully transparent.
fn key_sentinel(image: &RgbaImage) -> RgbaImage {
    let sentinel = Rgb::SENTINEL.to_rgba();
    let mut keyed = image.clone();
    for px in keyed.pixels_mut().filter(|px| **px == sentinel) {
        *px = Rgba([sentinel[0], sentinel[1], sentinel[2], 0]);
    }
    keyed
}

fn encode_err(e: image::ImageError) -> Error {
    Error::Encode(e.to_string())
}
