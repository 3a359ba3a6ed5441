use std::fs;
use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;

/// The file operations the persistent cache needs, and nothing else
pub trait CacheFileSystem: Send + Sync {
    fn file_exists(&self, path: &Path) -> bool;

    /// Create `path` and any missing parents; succeeds if it already exists
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()>;
}

/// `std::fs` backed implementation.
///
/// Writes land in a temporary file next to the destination and are renamed over it,
/// so concurrent writers of the same key never leave a torn file behind.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

impl CacheFileSystem for LocalFileSystem {
    fn file_exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(contents)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }
}
