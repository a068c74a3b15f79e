//! Source loading and persistence.
//!
//! The transform pipeline never touches the filesystem itself. It asks a
//! [`FileService`] for bytes and hands bytes back to it. A loader answers
//! either with the complete contents or with an explicit "not found"
//! (`Ok(None)`); it never returns a partial read as success.
//!
//! [`FsFileService`] is the filesystem implementation. Identifiers are
//! relative paths resolved against a root directory, and any identifier that
//! would leave the root (absolute paths, `..` segments) is treated as
//! missing.

use crate::error::{Error, Result};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

pub trait FileService: Send + Sync {
    /// Full contents of a stored file, or `None` if there is no such file.
    fn get_file(&self, path: &str) -> Result<Option<Vec<u8>>>;

    /// Full contents of an uploaded temporary file.
    fn get_temp_file(&self, path: &str) -> Result<Option<Vec<u8>>> {
        self.get_file(path)
    }

    fn save_file(&self, path: &str, bytes: &[u8]) -> Result<()>;

    /// Remove a stored file. Returns whether anything was removed.
    fn delete_file(&self, path: &str) -> Result<bool>;

    /// Remove an uploaded temporary file. Returns whether anything was
    /// removed.
    fn delete_temp_file(&self, path: &str) -> Result<bool> {
        self.delete_file(path)
    }
}

/// [`FileService`] over a directory tree, with an optional separate
/// directory for temporary uploads.
#[derive(Debug, Clone)]
pub struct FsFileService {
    root: PathBuf,
    temp_root: Option<PathBuf>,
}

impl FsFileService {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            temp_root: None,
        }
    }

    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_root = Some(dir.into());
        self
    }

    fn temp_root(&self) -> &Path {
        self.temp_root.as_deref().unwrap_or(&self.root)
    }
}

/// Join `path` onto `root`, refusing anything that could escape it.
pub(crate) fn confine(root: &Path, path: &str) -> Option<PathBuf> {
    let relative = Path::new(path);
    let mut out = root.to_path_buf();
    let mut any = false;
    for component in relative.components() {
        match component {
            Component::Normal(part) => {
                out.push(part);
                any = true;
            }
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    any.then_some(out)
}

fn read_optional(root: &Path, path: &str) -> Result<Option<Vec<u8>>> {
    let Some(full) = confine(root, path) else {
        return Ok(None);
    };
    match fs::read(&full) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        // Directories and similar non-files count as absent.
        Err(_) if full.is_dir() => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn delete_optional(root: &Path, path: &str) -> Result<bool> {
    let Some(full) = confine(root, path) else {
        return Ok(false);
    };
    match fs::remove_file(&full) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

impl FileService for FsFileService {
    fn get_file(&self, path: &str) -> Result<Option<Vec<u8>>> {
        read_optional(&self.root, path)
    }

    fn get_temp_file(&self, path: &str) -> Result<Option<Vec<u8>>> {
        read_optional(self.temp_root(), path)
    }

    fn save_file(&self, path: &str, bytes: &[u8]) -> Result<()> {
        let full = confine(&self.root, path)
            .ok_or_else(|| Error::invalid(format!("path '{path}' is outside the store")))?;
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&full, bytes)?;
        Ok(())
    }

    fn delete_file(&self, path: &str) -> Result<bool> {
        delete_optional(&self.root, path)
    }

    fn delete_temp_file(&self, path: &str) -> Result<bool> {
        delete_optional(self.temp_root(), path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn get_file_reads_existing() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("photos")).unwrap();
        fs::write(tmp.path().join("photos/a.jpg"), b"bytes").unwrap();

        let svc = FsFileService::new(tmp.path());
        assert_eq!(svc.get_file("photos/a.jpg").unwrap(), Some(b"bytes".to_vec()));
        assert_eq!(svc.get_file("./photos/a.jpg").unwrap(), Some(b"bytes".to_vec()));
    }

    #[test]
    fn get_file_missing_is_none() {
        let tmp = TempDir::new().unwrap();
        let svc = FsFileService::new(tmp.path());
        assert_eq!(svc.get_file("nope.png").unwrap(), None);
        assert_eq!(svc.get_file("").unwrap(), None);
    }

    #[test]
    fn escaping_paths_are_not_found() {
        let tmp = TempDir::new().unwrap();
        let inner = tmp.path().join("store");
        fs::create_dir_all(&inner).unwrap();
        fs::write(tmp.path().join("secret.txt"), b"x").unwrap();

        let svc = FsFileService::new(&inner);
        assert_eq!(svc.get_file("../secret.txt").unwrap(), None);
        let absolute = tmp.path().join("secret.txt");
        assert_eq!(svc.get_file(absolute.to_str().unwrap()).unwrap(), None);
        assert!(svc.save_file("../evil.txt", b"x").is_err());
    }

    #[test]
    fn directory_counts_as_missing() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("dir")).unwrap();
        let svc = FsFileService::new(tmp.path());
        assert_eq!(svc.get_file("dir").unwrap(), None);
    }

    #[test]
    fn save_creates_parents_and_delete_removes() {
        let tmp = TempDir::new().unwrap();
        let svc = FsFileService::new(tmp.path());

        svc.save_file("Images/out/x.png", b"png").unwrap();
        assert_eq!(fs::read(tmp.path().join("Images/out/x.png")).unwrap(), b"png");

        assert!(svc.delete_file("Images/out/x.png").unwrap());
        assert!(!svc.delete_file("Images/out/x.png").unwrap());
    }

    #[test]
    fn temp_files_use_temp_dir() {
        let store = TempDir::new().unwrap();
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("upload.png"), b"up").unwrap();

        let svc = FsFileService::new(store.path()).with_temp_dir(temp.path());
        assert_eq!(svc.get_temp_file("upload.png").unwrap(), Some(b"up".to_vec()));
        assert_eq!(svc.get_file("upload.png").unwrap(), None);
        assert!(svc.delete_temp_file("upload.png").unwrap());
        assert!(!temp.path().join("upload.png").exists());
    }
}
