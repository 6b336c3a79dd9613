//! On-disk layout of one namespace directory.
//!
//! ```text
//! <namespace_dir>/vectors.npy   (N, D) float32 matrix
//! <namespace_dir>/meta.json     N chunk records, same order as the rows
//! ```

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

pub const VECTORS_FILE: &str = "vectors.npy";
pub const META_FILE: &str = "meta.json";

#[derive(Debug, Clone)]
pub(crate) struct IndexFiles {
    pub vectors: PathBuf,
    pub meta: PathBuf,
}

impl IndexFiles {
    pub fn new(dir: &Path) -> Self {
        Self {
            vectors: dir.join(VECTORS_FILE),
            meta: dir.join(META_FILE),
        }
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name: OsString = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write to a sibling `.tmp` file, then rename over `path`.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let tmp = temp_path(path);
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)
}

/// Remove `path` and any leftover temp file. Returns whether `path` existed.
pub(crate) fn remove_if_exists(path: &Path) -> io::Result<bool> {
    let _ = std::fs::remove_file(temp_path(path));
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
