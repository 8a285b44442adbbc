//! File system utils.

use std::{
    fs::{File, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
};

use fs2::FileExt;

pub struct FsHandler;

impl FsHandler {
    /// Path of the scratch file used while atomically replacing `path`.
    fn scratch_path(path: &Path) -> PathBuf {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        path.with_file_name(format!(".{file_name}.tmp"))
    }

    /// Replace the content of `path` without ever exposing a partially written file.
    ///
    /// The content goes to a scratch file in the same directory, is flushed to disk, then
    /// renamed over the destination. Readers see either the old or the new document.
    pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let scratch = Self::scratch_path(path);
        {
            let mut file = File::create(&scratch)?;
            file.write_all(contents)?;
            file.sync_all()?;
        }

        if let Err(err) = std::fs::rename(&scratch, path) {
            let _ = std::fs::remove_file(&scratch);
            return Err(err);
        }
        Self::sync_parent(path)?;

        tracing::trace!(path = %path.display(), bytes = contents.len(), "File replaced");
        Ok(())
    }

    /// Flush the directory entry of `path`, so that a completed rename survives a crash.
    #[cfg(unix)]
    fn sync_parent(path: &Path) -> io::Result<()> {
        let parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        File::open(parent)?.sync_all()
    }

    /// Directories cannot be opened as files here; the rename alone is relied upon.
    #[cfg(not(unix))]
    fn sync_parent(_path: &Path) -> io::Result<()> {
        Ok(())
    }

    /// Take a non-blocking exclusive advisory lock on `path`, creating it if needed.
    ///
    /// Returns `Ok(None)` when another process already holds the lock. The lock is
    /// released when the returned file is dropped.
    pub fn try_lock_exclusive(path: &Path) -> io::Result<Option<File>> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(file)),
            Err(err) if err.kind() == fs2::lock_contended_error().kind() => Ok(None),
            Err(err) => Err(err),
        }
    }
}
