//! Shared test utilities for the thumbcache test suite.
//!
//! Provides an in-memory [`FileService`] that records every call, plus small
//! raster fixtures and encode/decode shortcuts.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let files = MemoryFiles::new().with_file("a.png", png_bytes(&solid(8, 8, RED)));
//! let service = TransformService::with_files(files, &ServiceConfig::default());
//! // ...
//! assert_eq!(service.files().ops(), vec![FileOp::Get("a.png".into())]);
//! ```

use crate::error::Result;
use crate::files::FileService;
use image::{ImageFormat, Rgba, RgbaImage};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Mutex;

pub const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
pub const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);
pub const GRAY: Rgba<u8> = Rgba([128, 128, 128, 255]);

// =========================================================================
// Raster fixtures
// =========================================================================

pub fn solid(w: u32, h: u32, px: Rgba<u8>) -> RgbaImage {
    RgbaImage::from_pixel(w, h, px)
}

pub fn png_bytes(image: &RgbaImage) -> Vec<u8> {
    let mut buf = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

pub fn decode(bytes: &[u8]) -> RgbaImage {
    image::load_from_memory(bytes).unwrap().into_rgba8()
}

// =========================================================================
// Recording file service
// =========================================================================

/// A recorded [`FileService`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOp {
    Get(String),
    GetTemp(String),
    Save(String),
    Delete(String),
    DeleteTemp(String),
}

/// In-memory [`FileService`] with separate stored and temp namespaces.
#[derive(Default)]
pub struct MemoryFiles {
    files: Mutex<HashMap<String, Vec<u8>>>,
    temp: Mutex<HashMap<String, Vec<u8>>>,
    ops: Mutex<Vec<FileOp>>,
}

impl MemoryFiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, path: &str, bytes: Vec<u8>) -> Self {
        self.files.lock().unwrap().insert(path.to_string(), bytes);
        self
    }

    pub fn with_temp_file(self, path: &str, bytes: Vec<u8>) -> Self {
        self.temp.lock().unwrap().insert(path.to_string(), bytes);
        self
    }

    pub fn stored(&self, path: &str) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(path).cloned()
    }

    pub fn ops(&self) -> Vec<FileOp> {
        self.ops.lock().unwrap().clone()
    }

    fn record(&self, op: FileOp) {
        self.ops.lock().unwrap().push(op);
    }
}

impl FileService for MemoryFiles {
    fn get_file(&self, path: &str) -> Result<Option<Vec<u8>>> {
        self.record(FileOp::Get(path.to_string()));
        Ok(self.files.lock().unwrap().get(path).cloned())
    }

    fn get_temp_file(&self, path: &str) -> Result<Option<Vec<u8>>> {
        self.record(FileOp::GetTemp(path.to_string()));
        Ok(self.temp.lock().unwrap().get(path).cloned())
    }

    fn save_file(&self, path: &str, bytes: &[u8]) -> Result<()> {
        self.record(FileOp::Save(path.to_string()));
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), bytes.to_vec());
        Ok(())
    }

    fn delete_file(&self, path: &str) -> Result<bool> {
        self.record(FileOp::Delete(path.to_string()));
        Ok(self.files.lock().unwrap().remove(path).is_some())
    }

    fn delete_temp_file(&self, path: &str) -> Result<bool> {
        self.record(FileOp::DeleteTemp(path.to_string()));
        Ok(self.temp.lock().unwrap().remove(path).is_some())
    }
}
