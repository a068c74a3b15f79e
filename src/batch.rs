//! Parallel rendering of a list of jobs.
//!
//! A job file is JSON: an array of jobs, each naming a source, a request,
//! an output format and an output path relative to the output directory.
//!
//! ```json
//! [
//!   {
//!     "source": "photos/dawn.jpg",
//!     "request": { "mode": "crop", "width": 400, "height": 500, "anchor": "top" },
//!     "format": "jpeg",
//!     "output": "dawn-thumb.jpg"
//!   }
//! ]
//! ```
//!
//! Jobs run on the rayon pool and share one [`TransformService`], so
//! repeated requests hit its cache. A failing job is reported in its
//! [`JobOutcome`] and does not stop the others.

use crate::cache::CacheStats;
use crate::error::{Error, Result};
use crate::files::{FileService, confine};
use crate::imaging::{OutputFormat, TransformRequest};
use crate::service::{Source, TransformService};
use rayon::prelude::*;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatchJob {
    pub source: String,
    pub request: TransformRequest,
    #[serde(default = "default_format")]
    pub format: OutputFormat,
    pub output: String,
}

fn default_format() -> OutputFormat {
    OutputFormat::Png
}

/// Size and type of one written derivative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Written {
    pub path: PathBuf,
    pub content_type: &'static str,
    pub bytes: usize,
}

#[derive(Debug)]
pub struct JobOutcome {
    pub source: String,
    pub output: String,
    pub result: Result<Written>,
}

#[derive(Debug)]
pub struct BatchResult {
    /// One outcome per job, in job-file order.
    pub outcomes: Vec<JobOutcome>,
    pub cache_stats: Option<CacheStats>,
}

impl BatchResult {
    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_err()).count()
    }
}

pub fn load_jobs(path: &Path) -> std::result::Result<Vec<BatchJob>, BatchError> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Render every job into `out_dir`.
pub fn run_batch<F: FileService>(
    service: &TransformService<F>,
    jobs: &[BatchJob],
    out_dir: &Path,
) -> std::result::Result<BatchResult, BatchError> {
    std::fs::create_dir_all(out_dir)?;

    let outcomes = jobs
        .par_iter()
        .map(|job| JobOutcome {
            source: job.source.clone(),
            output: job.output.clone(),
            result: run_job(service, job, out_dir),
        })
        .collect();

    Ok(BatchResult {
        outcomes,
        cache_stats: service.cache().map(|c| c.stats()),
    })
}

fn run_job<F: FileService>(
    service: &TransformService<F>,
    job: &BatchJob,
    out_dir: &Path,
) -> Result<Written> {
    let path = confine(out_dir, &job.output).ok_or_else(|| {
        Error::invalid(format!(
            "output '{}' must be a relative path inside the output directory",
            job.output
        ))
    })?;

    let rendered = service.render_cached(Source::Path(&job.source), &job.request, job.format)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, &rendered.bytes)?;
    debug!(source = %job.source, output = %path.display(), "job written");

    Ok(Written {
        path,
        content_type: rendered.content_type,
        bytes: rendered.bytes.len(),
    })
}
