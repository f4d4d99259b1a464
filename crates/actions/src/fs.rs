//! Filesystem operations used by actions

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Metadata the executor needs about an existing file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileMeta {
    pub len: u64,
    pub modified: Option<SystemTime>,
}

/// Filesystem primitives the executor is built on
///
/// Every method reports failure as a plain `io::Error`.
pub trait FileSystem: Send + Sync + 'static {
    fn exists(&self, path: &Path) -> bool;

    fn is_dir(&self, path: &Path) -> bool;

    fn metadata(&self, path: &Path) -> io::Result<FileMeta>;

    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf>;

    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Move `from` to `to`, replacing `to` if it exists
    fn move_file(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Copy `from` to `to`, replacing `to` if it exists
    fn copy_file(&self, from: &Path, to: &Path) -> io::Result<()>;

    fn remove_file(&self, path: &Path) -> io::Result<()>;

    /// Create a symbolic link at `link` pointing to `target`
    fn create_symlink(&self, target: &Path, link: &Path) -> io::Result<()>;

    /// Write a zip archive at `archive` holding `source` as its only entry
    fn create_archive(&self, source: &Path, archive: &Path) -> io::Result<()>;
}

/// `FileSystem` backed by `std::fs`
#[derive(Debug, Clone, Copy, Default)]
pub struct StdFileSystem;

impl FileSystem for StdFileSystem {
    fn exists(&self, path: &Path) -> bool {
        // symlink_metadata so dangling links still count as occupying the name
        fs::symlink_metadata(path).is_ok()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn metadata(&self, path: &Path) -> io::Result<FileMeta> {
        let meta = fs::metadata(path)?;
        Ok(FileMeta {
            len: meta.len(),
            modified: meta.modified().ok(),
        })
    }

    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        fs::canonicalize(path)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }

    fn move_file(&self, from: &Path, to: &Path) -> io::Result<()> {
        match fs::rename(from, to) {
            Ok(()) => Ok(()),
            Err(e) if is_cross_device(&e) => {
                fs::copy(from, to)?;
                fs::remove_file(from)
            }
            Err(e) => Err(e),
        }
    }

    fn copy_file(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::copy(from, to).map(|_| ())
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn create_symlink(&self, target: &Path, link: &Path) -> io::Result<()> {
        #[cfg(unix)]
        {
            std::os::unix::fs::symlink(target, link)
        }
        #[cfg(windows)]
        {
            std::os::windows::fs::symlink_file(target, link)
        }
    }

    fn create_archive(&self, source: &Path, archive: &Path) -> io::Result<()> {
        let entry_name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "source has no file name"))?;

        let mut input = File::open(source)?;
        let mut writer = ZipWriter::new(File::create(archive)?);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        writer.start_file(entry_name, options).map_err(io::Error::other)?;
        io::copy(&mut input, &mut writer)?;
        writer.finish().map_err(io::Error::other)?;
        Ok(())
    }
}

/// Rename across mount points fails with EXDEV / ERROR_NOT_SAME_DEVICE
fn is_cross_device(e: &io::Error) -> bool {
    #[cfg(unix)]
    const CROSS_DEVICE: i32 = 18;
    #[cfg(windows)]
    const CROSS_DEVICE: i32 = 17;
    e.raw_os_error() == Some(CROSS_DEVICE)
}
