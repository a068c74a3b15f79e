//! Request types for the transform pipeline.
//!
//! These types describe *what* to produce, not *how*. A [`TransformRequest`]
//! is a tagged variant: each mode carries only the parameters it uses, so a
//! Crop request cannot accidentally carry a background colour and a Scale
//! request cannot carry an anchor.
//!
//! ## Types
//!
//! - [`Mode`]: the bare mode tag (used in cache keys and for parsing).
//! - [`TransformRequest`]: mode plus its parameters.
//! - [`Anchor`]: edge a Crop aligns against.
//! - [`Rgb`]: opaque colour, parsed from `RRGGBB` hex.
//! - [`OutputFormat`]: encoded container, with its content type.
//! - [`Quality`]: lossy encoding quality (1–100). Clamped on construction.
//!
//! Enum text parsing is case-insensitive and also accepts the numeric codes
//! used by older clients (`"1"` for Scale, `"3"` for HighQualityJpeg, ...).

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Transform mode tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Mode {
    Raw,
    Scale,
    Crop,
    SpecifiedCrop,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Raw => "Raw",
            Mode::Scale => "Scale",
            Mode::Crop => "Crop",
            Mode::SpecifiedCrop => "SpecifiedCrop",
        }
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "raw" | "0" => Ok(Mode::Raw),
            "scale" | "1" => Ok(Mode::Scale),
            "crop" | "3" => Ok(Mode::Crop),
            "specifiedcrop" | "specified_crop" | "specified-crop" | "4" => Ok(Mode::SpecifiedCrop),
            _ => Err(Error::invalid(format!("unknown mode '{s}'"))),
        }
    }
}

/// Edge or point of the target box that a scale-to-cover crop aligns against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Anchor {
    #[default]
    Center,
    Top,
    Bottom,
    Left,
    Right,
}

impl Anchor {
    pub fn as_str(self) -> &'static str {
        match self {
            Anchor::Center => "Center",
            Anchor::Top => "Top",
            Anchor::Bottom => "Bottom",
            Anchor::Left => "Left",
            Anchor::Right => "Right",
        }
    }
}

impl FromStr for Anchor {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "center" | "centre" | "0" => Ok(Anchor::Center),
            "top" | "1" => Ok(Anchor::Top),
            "bottom" | "2" => Ok(Anchor::Bottom),
            "left" | "3" => Ok(Anchor::Left),
            "right" | "4" => Ok(Anchor::Right),
            _ => Err(Error::invalid(format!("unknown anchor '{s}'"))),
        }
    }
}

/// Encoded output container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum OutputFormat {
    Png,
    Jpeg,
    Gif,
    /// JPEG at a fixed quality of 95.
    HighQualityJpeg,
}

impl OutputFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            OutputFormat::Png => "Png",
            OutputFormat::Jpeg => "Jpeg",
            OutputFormat::Gif => "Gif",
            OutputFormat::HighQualityJpeg => "HighQualityJpeg",
        }
    }

    /// MIME type served alongside the encoded bytes.
    pub fn content_type(self) -> &'static str {
        match self {
            OutputFormat::Png => "image/png",
            OutputFormat::Gif => "image/gif",
            OutputFormat::Jpeg | OutputFormat::HighQualityJpeg => "image/jpeg",
        }
    }

    /// Fixed JPEG quality, or `None` to use the encoder default.
    pub fn jpeg_quality(self) -> Option<Quality> {
        match self {
            OutputFormat::HighQualityJpeg => Some(Quality::new(95)),
            _ => None,
        }
    }

    /// Whether the container keeps an alpha channel. The encoder keys the
    /// sentinel colour to transparency only for these.
    pub fn has_alpha(self) -> bool {
        matches!(self, OutputFormat::Png | OutputFormat::Gif)
    }

    pub(crate) fn image_format(self) -> image::ImageFormat {
        match self {
            OutputFormat::Png => image::ImageFormat::Png,
            OutputFormat::Gif => image::ImageFormat::Gif,
            OutputFormat::Jpeg | OutputFormat::HighQualityJpeg => image::ImageFormat::Jpeg,
        }
    }
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" | "0" => Ok(OutputFormat::Png),
            "jpeg" | "jpg" | "1" => Ok(OutputFormat::Jpeg),
            "gif" | "2" => Ok(OutputFormat::Gif),
            "highqualityjpeg" | "high_quality_jpeg" | "hq-jpeg" | "3" => {
                Ok(OutputFormat::HighQualityJpeg)
            }
            _ => Err(Error::invalid(format!("unknown output format '{s}'"))),
        }
    }
}

macro_rules! text_enum_conversions {
    ($($ty:ty),*) => {$(
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl TryFrom<String> for $ty {
            type Error = Error;

            fn try_from(value: String) -> Result<Self> {
                value.parse()
            }
        }

        impl From<$ty> for String {
            fn from(value: $ty) -> Self {
                value.as_str().to_string()
            }
        }
    )*};
}

text_enum_conversions!(Mode, Anchor, OutputFormat);

/// Opaque RGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    /// Letterbox fill used when no background is requested. The encoder keys
    /// this exact colour to full transparency for formats with alpha.
    pub const SENTINEL: Rgb = Rgb::new(255, 0, 255);

    /// Fill of the placeholder raster substituted for missing sources.
    pub const PLACEHOLDER_GRAY: Rgb = Rgb::new(128, 128, 128);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `RRGGBB` (an optional leading `#` is tolerated).
    pub fn from_hex(hex: &str) -> Result<Self> {
        let digits = hex.trim().trim_start_matches('#');
        if digits.len() != 6 || !digits.is_ascii() {
            return Err(Error::invalid(format!(
                "colour '{hex}' is not in hexadecimal RRGGBB form, e.g. 'AABB22'"
            )));
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&digits[range], 16)
                .map_err(|_| Error::invalid(format!("colour '{hex}' contains non-hex digits")))
        };
        Ok(Self::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }

    pub fn to_hex(self) -> String {
        format!("{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    pub fn to_rgba(self) -> image::Rgba<u8> {
        image::Rgba([self.r, self.g, self.b, 255])
    }
}

impl FromStr for Rgb {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Rgb::from_hex(s)
    }
}

impl TryFrom<String> for Rgb {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Rgb::from_hex(&value)
    }
}

impl From<Rgb> for String {
    fn from(value: Rgb) -> Self {
        value.to_hex()
    }
}

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u8);

impl Quality {
    pub fn new(value: u8) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

/// Bounds for Raw mode.
///
/// Serialized flat: `max_dimension`, or `max_width` with `max_height`, or
/// neither.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawFields", into = "RawFields")]
pub enum RawBounds {
    /// Pass the source through at its own size.
    #[default]
    Unbounded,
    /// Fit within a `n` x `n` square.
    MaxDimension(u32),
    /// Fit within an explicit box.
    MaxBox { max_width: u32, max_height: u32 },
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
struct RawFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max_dimension: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max_width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max_height: Option<u32>,
}

impl TryFrom<RawFields> for RawBounds {
    type Error = Error;

    fn try_from(f: RawFields) -> Result<Self> {
        match (f.max_dimension, f.max_width, f.max_height) {
            (Some(m), _, _) => Ok(RawBounds::MaxDimension(m)),
            (None, Some(max_width), Some(max_height)) => Ok(RawBounds::MaxBox {
                max_width,
                max_height,
            }),
            (None, None, None) => Ok(RawBounds::Unbounded),
            _ => Err(Error::invalid(
                "Raw needs a max dimension, or both max width and max height",
            )),
        }
    }
}

impl From<RawBounds> for RawFields {
    fn from(bounds: RawBounds) -> Self {
        match bounds {
            RawBounds::Unbounded => RawFields::default(),
            RawBounds::MaxDimension(m) => RawFields {
                max_dimension: Some(m),
                ..Default::default()
            },
            RawBounds::MaxBox {
                max_width,
                max_height,
            } => RawFields {
                max_width: Some(max_width),
                max_height: Some(max_height),
                ..Default::default()
            },
        }
    }
}

/// Fractional source region for SpecifiedCrop. Never validated or clamped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatioRegion {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleParams {
    pub width: u32,
    pub height: u32,
    /// Letterbox fill; `None` uses [`Rgb::SENTINEL`].
    #[serde(default)]
    pub background: Option<Rgb>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropParams {
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub anchor: Anchor,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpecifiedCropParams {
    pub width: u32,
    pub height: u32,
    pub region: RatioRegion,
}

/// What to produce from a source image.
///
/// | mode | behaviour |
/// |---|---|
/// | `Raw` | source as-is, or scaled *down* to fit the bounds |
/// | `Scale` | fit into the box, letterbox with the background colour |
/// | `Crop` | cover the box, crop the overflow per anchor |
/// | `SpecifiedCrop` | resample a ratio region into the box, distortion allowed |
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TransformRequest {
    Raw(RawBounds),
    Scale(ScaleParams),
    Crop(CropParams),
    SpecifiedCrop(SpecifiedCropParams),
}

impl TransformRequest {
    pub fn raw() -> Self {
        Self::Raw(RawBounds::Unbounded)
    }

    pub fn raw_max(max_dimension: u32) -> Self {
        Self::Raw(RawBounds::MaxDimension(max_dimension))
    }

    pub fn scale(width: u32, height: u32, background: Option<Rgb>) -> Self {
        Self::Scale(ScaleParams {
            width,
            height,
            background,
        })
    }

    pub fn crop(width: u32, height: u32, anchor: Anchor) -> Self {
        Self::Crop(CropParams {
            width,
            height,
            anchor,
        })
    }

    pub fn specified_crop(width: u32, height: u32, region: RatioRegion) -> Self {
        Self::SpecifiedCrop(SpecifiedCropParams {
            width,
            height,
            region,
        })
    }

    pub fn mode(&self) -> Mode {
        match self {
            Self::Raw(_) => Mode::Raw,
            Self::Scale(_) => Mode::Scale,
            Self::Crop(_) => Mode::Crop,
            Self::SpecifiedCrop(_) => Mode::SpecifiedCrop,
        }
    }

    /// The requested output box: fixed size for Scale/Crop/SpecifiedCrop,
    /// the bounds for Raw, `(0, 0)` for unbounded Raw.
    pub fn dimensions(&self) -> (u32, u32) {
        match *self {
            Self::Raw(RawBounds::Unbounded) => (0, 0),
            Self::Raw(RawBounds::MaxDimension(m)) => (m, m),
            Self::Raw(RawBounds::MaxBox {
                max_width,
                max_height,
            }) => (max_width, max_height),
            Self::Scale(p) => (p.width, p.height),
            Self::Crop(p) => (p.width, p.height),
            Self::SpecifiedCrop(p) => (p.width, p.height),
        }
    }

    /// Size of the grey stand-in raster when the source is missing.
    ///
    /// Unbounded Raw has no size to borrow, so it has no placeholder.
    pub fn placeholder_size(&self) -> Option<(u32, u32)> {
        match self {
            Self::Raw(RawBounds::Unbounded) => None,
            _ => Some(self.dimensions()),
        }
    }

    /// Reject requests whose output dimensions are zero. Ratios are
    /// deliberately left alone.
    pub fn validate(&self) -> Result<()> {
        let (w, h) = self.dimensions();
        match self {
            Self::Raw(RawBounds::Unbounded) => Ok(()),
            Self::Raw(RawBounds::MaxDimension(0)) => {
                Err(Error::invalid("max dimension must be greater than zero"))
            }
            Self::Raw(RawBounds::MaxBox { .. }) if w == 0 || h == 0 => Err(Error::invalid(
                "max width and max height must be greater than zero",
            )),
            _ if w == 0 || h == 0 => Err(Error::invalid(format!(
                "{} requires width and height greater than zero (got {w}x{h})",
                self.mode()
            ))),
            _ => Ok(()),
        }
    }

    /// Assemble a request from loosely-typed fields, the way query strings
    /// and command-line flags arrive.
    pub fn from_fields(mode: Mode, fields: RequestFields) -> Result<Self> {
        let request = match mode {
            Mode::Raw => Self::Raw(RawBounds::try_from(RawFields {
                max_dimension: fields.max_dimension,
                max_width: fields.max_width,
                max_height: fields.max_height,
            })?),
            Mode::Scale => {
                let (width, height) = fields.require_size(mode)?;
                Self::scale(width, height, fields.background)
            }
            Mode::Crop => {
                let (width, height) = fields.require_size(mode)?;
                Self::crop(width, height, fields.anchor.unwrap_or_default())
            }
            Mode::SpecifiedCrop => {
                let (width, height) = fields.require_size(mode)?;
                let region = fields
                    .region
                    .ok_or_else(|| Error::invalid("SpecifiedCrop requires all four ratios"))?;
                Self::specified_crop(width, height, region)
            }
        };
        request.validate()?;
        Ok(request)
    }
}

/// Loose request fields prior to validation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RequestFields {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub max_dimension: Option<u32>,
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
    pub anchor: Option<Anchor>,
    pub background: Option<Rgb>,
    pub region: Option<RatioRegion>,
}

impl RequestFields {
    fn require_size(&self, mode: Mode) -> Result<(u32, u32)> {
        match (self.width, self.height) {
            (Some(w), Some(h)) => Ok((w, h)),
            _ => Err(Error::invalid(format!("{mode} requires width and height"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parses_names_and_codes() {
        assert_eq!("scale".parse::<Mode>().unwrap(), Mode::Scale);
        assert_eq!("SpecifiedCrop".parse::<Mode>().unwrap(), Mode::SpecifiedCrop);
        assert_eq!("3".parse::<Mode>().unwrap(), Mode::Crop);
        assert_eq!("0".parse::<Mode>().unwrap(), Mode::Raw);
    }

    #[test]
    fn mode_rejects_unknown() {
        let err = "2".parse::<Mode>().unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
        assert!("stretch".parse::<Mode>().is_err());
    }

    #[test]
    fn anchor_parse_is_case_insensitive() {
        assert_eq!("TOP".parse::<Anchor>().unwrap(), Anchor::Top);
        assert_eq!("right".parse::<Anchor>().unwrap(), Anchor::Right);
        assert!("middle".parse::<Anchor>().is_err());
    }

    #[test]
    fn output_format_content_types() {
        assert_eq!(OutputFormat::Png.content_type(), "image/png");
        assert_eq!(OutputFormat::Gif.content_type(), "image/gif");
        assert_eq!(OutputFormat::Jpeg.content_type(), "image/jpeg");
        assert_eq!(OutputFormat::HighQualityJpeg.content_type(), "image/jpeg");
    }

    #[test]
    fn output_format_parses_codes() {
        assert_eq!("2".parse::<OutputFormat>().unwrap(), OutputFormat::Gif);
        assert_eq!(
            "highqualityjpeg".parse::<OutputFormat>().unwrap(),
            OutputFormat::HighQualityJpeg
        );
        assert!("webp".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn high_quality_jpeg_is_95() {
        assert_eq!(
            OutputFormat::HighQualityJpeg.jpeg_quality(),
            Some(Quality::new(95))
        );
        assert_eq!(OutputFormat::Jpeg.jpeg_quality(), None);
    }

    #[test]
    fn rgb_hex_roundtrip_and_hash_prefix() {
        let c = Rgb::from_hex("FFAADD").unwrap();
        assert_eq!(c, Rgb::new(0xFF, 0xAA, 0xDD));
        assert_eq!(c.to_hex(), "FFAADD");
        assert_eq!(Rgb::from_hex("#ffaadd").unwrap(), c);
    }

    #[test]
    fn rgb_rejects_bad_hex() {
        assert!(Rgb::from_hex("FFF").is_err());
        assert!(Rgb::from_hex("GGHHII").is_err());
        assert!(Rgb::from_hex("").is_err());
    }

    #[test]
    fn quality_clamps_to_valid_range() {
        assert_eq!(Quality::new(0).value(), 1);
        assert_eq!(Quality::new(50).value(), 50);
        assert_eq!(Quality::new(150).value(), 100);
    }

    #[test]
    fn validate_rejects_zero_dimensions() {
        assert!(TransformRequest::scale(0, 100, None).validate().is_err());
        assert!(TransformRequest::crop(100, 0, Anchor::Top).validate().is_err());
        assert!(TransformRequest::raw_max(0).validate().is_err());
        assert!(TransformRequest::raw().validate().is_ok());
    }

    #[test]
    fn validate_ignores_out_of_range_ratios() {
        let region = RatioRegion {
            left: 0.8,
            top: -0.2,
            width: 0.9,
            height: 2.0,
        };
        assert!(
            TransformRequest::specified_crop(10, 10, region)
                .validate()
                .is_ok()
        );
    }

    #[test]
    fn from_fields_defaults_anchor_to_center() {
        let req = TransformRequest::from_fields(
            Mode::Crop,
            RequestFields {
                width: Some(40),
                height: Some(30),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(req, TransformRequest::crop(40, 30, Anchor::Center));
    }

    #[test]
    fn from_fields_raw_variants() {
        let max = TransformRequest::from_fields(
            Mode::Raw,
            RequestFields {
                max_dimension: Some(50),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(max, TransformRequest::raw_max(50));

        let partial_box = TransformRequest::from_fields(
            Mode::Raw,
            RequestFields {
                max_width: Some(50),
                ..Default::default()
            },
        );
        assert!(partial_box.is_err());
    }

    #[test]
    fn from_fields_specified_crop_needs_ratios() {
        let err = TransformRequest::from_fields(
            Mode::SpecifiedCrop,
            RequestFields {
                width: Some(10),
                height: Some(10),
                ..Default::default()
            },
        );
        assert!(matches!(err, Err(Error::InvalidRequest(_))));
    }

    #[test]
    fn placeholder_size_follows_request_box() {
        assert_eq!(TransformRequest::raw_max(50).placeholder_size(), Some((50, 50)));
        assert_eq!(
            TransformRequest::scale(200, 100, None).placeholder_size(),
            Some((200, 100))
        );
        assert_eq!(TransformRequest::raw().placeholder_size(), None);
    }

    #[test]
    fn request_deserializes_from_tagged_json() {
        let req: TransformRequest = serde_json::from_str(
            r#"{"mode": "crop", "width": 64, "height": 48, "anchor": "bottom"}"#,
        )
        .unwrap();
        assert_eq!(req, TransformRequest::crop(64, 48, Anchor::Bottom));

        let req: TransformRequest =
            serde_json::from_str(r#"{"mode": "raw", "max_width": 64, "max_height": 48}"#).unwrap();
        assert_eq!(
            req,
            TransformRequest::Raw(RawBounds::MaxBox {
                max_width: 64,
                max_height: 48
            })
        );
        let req: TransformRequest = serde_json::from_str(r#"{"mode": "raw"}"#).unwrap();
        assert_eq!(req, TransformRequest::raw());

        let req: TransformRequest = serde_json::from_str(
            r#"{"mode": "scale", "width": 64, "height": 48, "background": "00FF00"}"#,
        )
        .unwrap();
        assert_eq!(
            req,
            TransformRequest::scale(64, 48, Some(Rgb::new(0, 255, 0)))
        );
    }
}
