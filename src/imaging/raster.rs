//! In-memory RGBA raster plus the resolution it was declared with.

use super::density::{self, Resolution};
use super::params::Rgb;
use crate::error::{Error, Result};
use image::{ImageReader, RgbaImage};
use std::io::Cursor;

#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    pub image: RgbaImage,
    pub resolution: Option<Resolution>,
}

impl Raster {
    pub fn new(image: RgbaImage) -> Self {
        Self {
            image,
            resolution: None,
        }
    }

    /// Solid opaque fill.
    pub fn filled(width: u32, height: u32, color: Rgb) -> Self {
        Self::new(RgbaImage::from_pixel(width, height, color.to_rgba()))
    }

    /// The grey stand-in substituted for a missing source.
    pub fn placeholder(width: u32, height: u32) -> Self {
        Self::filled(width, height, Rgb::PLACEHOLDER_GRAY)
    }

    /// Decode any supported container, sniffing the format from content.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| Error::Decode(e.to_string()))?;
        if reader.format().is_none() {
            return Err(Error::Decode("unrecognised image format".into()));
        }
        let image = reader
            .decode()
            .map_err(|e| Error::Decode(e.to_string()))?
            .into_rgba8();
        Ok(Self {
            image,
            resolution: density::read_resolution(bytes),
        })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}
