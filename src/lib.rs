//! # thumbcache
//!
//! On-demand image derivatives: resized, letterboxed, anchor-cropped or
//! ratio-cropped copies of a source image, encoded as PNG, GIF or JPEG, with
//! an expiring in-memory cache in front.
//!
//! # Architecture: One Pipeline
//!
//! ```text
//! caller → TransformService ─┬─ cache hit ─────────────────────────────→ bytes
//!                            └─ miss → resolve → transform → encode → store → bytes
//! ```
//!
//! - **resolve**: load the source through a [`files::FileService`] and decode
//!   it, or substitute the grey placeholder when it is missing.
//! - **transform**: one of four modes ([`imaging::TransformRequest`]),
//!   computed by pure geometry in [`imaging::calculations`].
//! - **encode**: PNG/GIF key the letterbox sentinel colour to transparency;
//!   JPEG carries the source DPI.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`imaging`] | Geometry, request types, transforms, encoding, DPI sniffing |
//! | [`cache`] | [`TransformCache`]: keyed, TTL-expiring memo of encoded output |
//! | [`files`] | [`files::FileService`] trait and the filesystem implementation |
//! | [`service`] | [`TransformService`]: resolve → transform → encode, cached or not |
//! | [`config`] | `thumbcache.toml` loading, validation and stock defaults |
//! | [`batch`] | Parallel rendering of JSON job files (rayon) |
//! | [`output`] | CLI output formatting |
//! | [`error`] | The shared [`Error`] taxonomy |
//!
//! # Design Decisions
//!
//! ## Transforms Are Pure
//!
//! Nothing under [`imaging`] performs I/O. Geometry works on integers and
//! compares ratios by cross-multiplying, so letterbox bands and crop offsets
//! are exact and reproducible. Only ratio regions use floating point, since
//! their inputs are fractions.
//!
//! ## Explicit Cache Ownership
//!
//! The cache is a value owned by the service that composes the pipeline,
//! with an injected clock. There is no global cache. The compute step runs
//! outside the cache lock; concurrent misses on one key may each render,
//! and the last write wins.
//!
//! ## Sentinel Transparency
//!
//! Scale mode letterboxes with a fixed magenta sentinel unless a background
//! is given. The encoder turns exactly that colour transparent for formats
//! with alpha. JPEG shows it as-is.

pub mod batch;
pub mod cache;
pub mod config;
pub mod error;
pub mod files;
pub mod imaging;
pub mod output;
pub mod service;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use cache::TransformCache;
pub use error::{Error, Result};
pub use imaging::{OutputFormat, TransformRequest};
pub use service::{Rendered, Source, TransformService};
