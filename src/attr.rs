//! Attribute source: the seam between the virtual image and the real disk.
//!
//! Everything the image engine knows about the backing tree flows through
//! [`AttrSource`]: entry listing, metadata, and content reads. The default
//! implementation is a thin wrapper over `std::fs`; tests or embedders can
//! substitute their own backing store.

use std::io;
use std::path::Path;

use bytes::Bytes;

/// Filesystem metadata captured at node-creation time. Never refreshed; the
/// backing tree is assumed static for the lifetime of an image.
#[derive(Debug, Clone, Copy)]
pub struct Attrs {
    pub is_dir: bool,
    pub is_file: bool,
    /// Byte size for regular files, 0 otherwise.
    pub size: u64,
}

/// Read-only view of the backing store consumed by the image engine.
pub trait AttrSource: Send + Sync {
    /// Metadata for `path`, or `None` if nothing exists there. `Err` is
    /// reserved for genuine I/O failures, never plain absence.
    fn attrs(&self, path: &Path) -> io::Result<Option<Attrs>>;

    /// Raw child names of a directory, in no particular order.
    fn list(&self, path: &Path) -> io::Result<Vec<String>>;

    /// Full content of a regular file.
    fn read_all(&self, path: &Path) -> io::Result<Bytes>;

    fn exists(&self, path: &Path) -> bool {
        matches!(self.attrs(path), Ok(Some(_)))
    }
}

/// [`AttrSource`] backed by `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdAttrSource;

impl AttrSource for StdAttrSource {
    fn attrs(&self, path: &Path) -> io::Result<Option<Attrs>> {
        match std::fs::metadata(path) {
            Ok(md) => Ok(Some(Attrs {
                is_dir: md.is_dir(),
                is_file: md.is_file(),
                size: if md.is_file() { md.len() } else { 0 },
            })),
            // A path below a regular file is plain absence, like a missing one.
            Err(e)
                if e.kind() == io::ErrorKind::NotFound
                    || e.kind() == io::ErrorKind::NotADirectory =>
            {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn list(&self, path: &Path) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(path)? {
            let entry = entry?;
            match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(raw) => {
                    warn!("skipping non-unicode entry {:?} under {}", raw, path.display());
                }
            }
        }
        Ok(names)
    }

    fn read_all(&self, path: &Path) -> io::Result<Bytes> {
        Ok(Bytes::from(std::fs::read(path)?))
    }
}
