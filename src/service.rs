//! Request orchestration: resolve → transform → encode, optionally cached.
//!
//! [`TransformService`] is the single entry point callers use. It owns the
//! file service it loads sources through and, when caching is enabled, the
//! [`TransformCache`] that memoizes encoded output.
//!
//! ## Missing sources
//!
//! A source identifier that resolves to nothing is handled by the
//! configured [`MissingSource`] policy: either a grey placeholder of the
//! requested size is encoded in place of the transform output, or
//! [`Error::SourceNotFound`] is returned. The identifier [`DEFAULT_SOURCE`]
//! always yields the placeholder without consulting the loader.
//!
//! A placeholder render is a successful result and is cached like any other.
//! A `SourceNotFound` error is never cached.

use crate::cache::{CacheKey, TransformCache, hash_bytes};
use crate::config::{MissingSource, ServiceConfig};
use crate::error::{Error, Result};
use crate::files::{FileService, FsFileService};
use crate::imaging::{self, OutputFormat, Raster, TransformRequest, encoder, transform};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Identifier that always resolves to the placeholder.
pub const DEFAULT_SOURCE: &str = "Default";

/// Where the source pixels come from.
#[derive(Debug, Clone, Copy)]
pub enum Source<'a> {
    /// Identifier resolved through the [`FileService`].
    Path(&'a str),
    /// Already-loaded encoded bytes.
    Bytes(&'a [u8]),
}

impl Source<'_> {
    /// Identity used in cache keys. In-memory sources are identified by the
    /// digest of their bytes.
    pub fn identity(&self) -> String {
        match self {
            Source::Path(path) => (*path).to_string(),
            Source::Bytes(bytes) => hash_bytes(bytes),
        }
    }

    fn label(&self) -> &str {
        match self {
            Source::Path(path) => path,
            Source::Bytes(_) => "<bytes>",
        }
    }
}

/// Encoded output ready to serve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub bytes: Arc<[u8]>,
    pub format: OutputFormat,
    pub content_type: &'static str,
}

impl Rendered {
    fn new(bytes: Arc<[u8]>, format: OutputFormat) -> Self {
        Self {
            bytes,
            format,
            content_type: format.content_type(),
        }
    }
}

pub struct TransformService<F: FileService = FsFileService> {
    files: F,
    cache: Option<TransformCache>,
    missing: MissingSource,
    distinguish_style: bool,
    web_max_dimension: u32,
}

impl TransformService<FsFileService> {
    /// Filesystem-backed service rooted at `source.root`.
    pub fn from_config(config: &ServiceConfig) -> Self {
        let mut files = FsFileService::new(&config.source.root);
        if let Some(temp) = &config.source.temp_dir {
            files = files.with_temp_dir(temp);
        }
        Self::with_files(files, config)
    }
}

impl<F: FileService> TransformService<F> {
    pub fn with_files(files: F, config: &ServiceConfig) -> Self {
        let cache = config
            .cache
            .enabled
            .then(|| TransformCache::new(config.cache.ttl()));
        Self {
            files,
            cache,
            missing: config.source.missing,
            distinguish_style: config.cache.distinguish_style,
            web_max_dimension: config.images.max_dimension,
        }
    }

    /// Replace the cache (e.g. one running on a manual clock).
    pub fn with_cache(mut self, cache: TransformCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn without_cache(mut self) -> Self {
        self.cache = None;
        self
    }

    pub fn files(&self) -> &F {
        &self.files
    }

    pub fn cache(&self) -> Option<&TransformCache> {
        self.cache.as_ref()
    }

    /// Resolve, transform and encode without touching the cache.
    pub fn render(
        &self,
        source: Source<'_>,
        request: &TransformRequest,
        format: OutputFormat,
    ) -> Result<Rendered> {
        encoder::ensure_supported(format)?;
        let raster = self.render_raster(source, request)?;
        let bytes = imaging::encode(&raster, format)?;
        Ok(Rendered::new(bytes.into(), format))
    }

    /// Like [`render`](Self::render), memoized per [`CacheKey`]. Falls back
    /// to an uncached render when caching is disabled.
    pub fn render_cached(
        &self,
        source: Source<'_>,
        request: &TransformRequest,
        format: OutputFormat,
    ) -> Result<Rendered> {
        let Some(cache) = &self.cache else {
            return self.render(source, request, format);
        };
        request.validate()?;
        encoder::ensure_supported(format)?;

        let key = CacheKey::new(source.identity(), request, format, self.distinguish_style);
        let bytes = cache.get_or_compute(&key, || {
            let raster = self.render_raster(source, request)?;
            imaging::encode(&raster, format)
        })?;
        Ok(Rendered::new(bytes, format))
    }

    /// Resolve and transform, returning the raster instead of bytes.
    pub fn render_raster(&self, source: Source<'_>, request: &TransformRequest) -> Result<Raster> {
        request.validate()?;
        match self.load(source)? {
            Some(raster) => {
                debug!(
                    source = source.label(),
                    mode = %request.mode(),
                    source_w = raster.width(),
                    source_h = raster.height(),
                    "applying transform"
                );
                Ok(transform::apply(&raster, request))
            }
            None => self.placeholder(source, request),
        }
    }

    /// Prepare an upload for the web: read `file_name` from the temp area
    /// under `source_dir`, scale it down to fit `images.max_dimension`, and
    /// store it as PNG under `target_dir`, replacing any previous file.
    ///
    /// Returns `Ok(false)` when the upload does not exist.
    pub fn save_for_web(&self, file_name: &str, source_dir: &str, target_dir: &str) -> Result<bool> {
        let source_path = join_store_path(source_dir, file_name);
        let Some(bytes) = self.files.get_temp_file(&source_path)? else {
            debug!(path = %source_path, "upload not found");
            return Ok(false);
        };

        let raster = Raster::decode(&bytes)?;
        let prepared = transform::fit_web(&raster, self.web_max_dimension);
        let encoded = imaging::encode(&prepared, OutputFormat::Png)?;

        let png_name = Path::new(file_name).with_extension("png");
        let target_path = join_store_path(target_dir, &png_name.to_string_lossy());
        self.files.delete_file(&target_path)?;
        self.files.save_file(&target_path, &encoded)?;
        info!(
            from = %source_path,
            to = %target_path,
            width = prepared.width(),
            height = prepared.height(),
            "saved for web"
        );
        Ok(true)
    }

    /// Remove a stored file. Returns whether anything was removed.
    pub fn delete(&self, path: &str) -> Result<bool> {
        self.files.delete_file(path)
    }

    fn load(&self, source: Source<'_>) -> Result<Option<Raster>> {
        match source {
            Source::Path(DEFAULT_SOURCE) => Ok(None),
            Source::Path(path) => match self.files.get_file(path)? {
                Some(bytes) => Raster::decode(&bytes).map(Some),
                None => Ok(None),
            },
            Source::Bytes(bytes) => Raster::decode(bytes).map(Some),
        }
    }

    fn placeholder(&self, source: Source<'_>, request: &TransformRequest) -> Result<Raster> {
        let explicit = matches!(source, Source::Path(DEFAULT_SOURCE));
        if !explicit && self.missing == MissingSource::Error {
            return Err(Error::SourceNotFound(source.label().to_string()));
        }
        let Some((w, h)) = request.placeholder_size() else {
            return Err(Error::SourceNotFound(source.label().to_string()));
        };
        if !explicit {
            warn!(source = source.label(), width = w, height = h, "source missing, using placeholder");
        }
        Ok(Raster::placeholder(w, h))
    }
}

fn join_store_path(dir: &str, name: &str) -> String {
    let dir = dir.trim_end_matches('/');
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{dir}/{name}")
    }
}
