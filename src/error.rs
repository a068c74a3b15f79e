//! Error taxonomy shared by the whole pipeline.
//!
//! Every public operation reports failures synchronously through [`Error`].
//! Nothing is retried internally. The only failure that is ever absorbed is a
//! missing source replaced by the grey placeholder, and only when
//! [`MissingSource::Placeholder`](crate::config::MissingSource) is configured.

use crate::imaging::OutputFormat;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The source identifier resolved to nothing.
    #[error("Source image not found: {0}")]
    SourceNotFound(String),
    /// Malformed enum text, bad colour, or non-positive output dimensions.
    #[error("Invalid transform request: {0}")]
    InvalidRequest(String),
    /// No codec for the requested output format is compiled in.
    #[error("No encoder available for {0}")]
    EncodingUnsupported(OutputFormat),
    #[error("Failed to decode source image: {0}")]
    Decode(String),
    #[error("Failed to encode image: {0}")]
    Encode(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
