//! Image processing: geometry, transforms and encoding.
//!
//! | Stage | Crate / function |
//! |---|---|
//! | **Decode** | `image::ImageReader` with content sniffing |
//! | **DPI** | custom header walker (JFIF APP0, PNG pHYs) |
//! | **Resample** | `imageops::resize`, Catmull-Rom |
//! | **Composite** | `imageops::replace` (source-copy, clipped) |
//! | **Encode** | `image` PNG / GIF / JPEG encoders |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing a transform request
//! - **Transform**: [`apply`] dispatching on the request mode
//! - **Encoder**: [`encode`] plus sentinel-colour keying

pub mod calculations;
pub(crate) mod density;
pub mod encoder;
mod params;
mod raster;
pub mod transform;

pub use density::Resolution;
pub use encoder::{content_type_for, encode};
pub use params::{
    Anchor, CropParams, Mode, OutputFormat, Quality, RatioRegion, RawBounds, RequestFields, Rgb,
    ScaleParams, SpecifiedCropParams, TransformRequest,
};
pub use raster::Raster;
pub use transform::apply;
