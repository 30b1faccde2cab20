//! Reconciling the registry with the download directory.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use walkdir::WalkDir;

use super::TaskManager;
use crate::error::{Error, Result};
use crate::task::{lock, Task};

/// Partial/metadata files of the delegated downloader; never tasks of their own.
const SIDECAR_EXTENSIONS: [&str; 2] = [".torrent", ".aria2"];

fn is_sidecar(name: &str) -> bool {
    SIDECAR_EXTENSIONS.iter().any(|ext| name.ends_with(ext))
}

/// aria2c's control file for `name`; it exists until the download is finished.
fn control_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}.aria2", name))
}

/// An entry the delegated downloader is still writing.
fn in_flight(dir: &Path, name: &str) -> bool {
    control_path(dir, name).exists()
}

/// Bytes under `path`: a file's length or, for a directory, the sum of its files.
pub(super) fn size_on_disk(path: &Path) -> io::Result<u64> {
    let meta = fs::metadata(path)?;
    if !meta.is_dir() {
        return Ok(meta.len());
    }
    let mut total = 0;
    for entry in WalkDir::new(path) {
        let entry = entry.map_err(io::Error::from)?;
        if entry.file_type().is_file() {
            total += entry.metadata().map_err(io::Error::from)?.len();
        }
    }
    Ok(total)
}

/// Deletes a task's file or directory and the downloader's control file.
/// Anything already gone is fine.
pub(super) fn remove_backing_files(dir: &Path, name: &str) -> Result<()> {
    let path = dir.join(name);
    let removed = match fs::symlink_metadata(&path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(&path),
        Ok(_) => fs::remove_file(&path),
        Err(e) => Err(e),
    };
    for result in [removed, fs::remove_file(control_path(dir, name))] {
        match result {
            Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(Error::Io(e)),
            _ => {}
        }
    }
    Ok(())
}

impl TaskManager {
    /// Total bytes under management. Unknown entries in the download directory
    /// are adopted as completed local tasks; in-progress tasks get their size
    /// refreshed from disk and count for at least their expected length.
    pub fn total_bytes_on_disk(&self) -> Result<u64> {
        let dir = &self.inner.settings.download_dir;
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut total = 0u64;
        let mut adopted = 0usize;
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_sidecar(&name) {
                continue;
            }
            // Entries can vanish mid-scan (a delegated download renaming its temp file).
            let size = match size_on_disk(&entry.path()) {
                Ok(size) => size,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };

            match self.inner.registry.get(&name) {
                Some(task) => {
                    let mut t = lock(&task);
                    if t.is_completed() {
                        total += size;
                    } else {
                        t.info.size = size;
                        total += size.max(t.info.content_length);
                    }
                }
                // Not ours yet: the task that owns it has not learned its name.
                None if in_flight(dir, &name) => {
                    tracing::debug!(task = %name, size, "in-flight delegated download, not adopted");
                    total += size;
                }
                None => {
                    let modified = entry
                        .metadata()
                        .and_then(|m| m.modified())
                        .ok()
                        .and_then(|m| m.duration_since(UNIX_EPOCH).ok())
                        .map(|d| d.as_secs())
                        .unwrap_or(0);
                    if self
                        .inner
                        .registry
                        .insert(Task::local(name.clone(), size, modified).into_shared())
                        .is_ok()
                    {
                        tracing::info!(task = %name, size, "adopted local file");
                        adopted += 1;
                    }
                    total += size;
                }
            }
        }
        if adopted > 0 {
            self.inner.signal.notify();
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_file_marks_entry_in_flight() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("ubuntu.iso"), b"part").unwrap();
        assert!(!in_flight(dir.path(), "ubuntu.iso"));
        fs::write(dir.path().join("ubuntu.iso.aria2"), b"ctl").unwrap();
        assert!(in_flight(dir.path(), "ubuntu.iso"));
    }

    #[test]
    fn sidecars_are_recognised() {
        assert!(is_sidecar("ubuntu.iso.aria2"));
        assert!(is_sidecar("ZDg6YW5ub3VuY2Uz.torrent"));
        assert!(!is_sidecar("ubuntu.iso"));
    }

    #[test]
    fn directory_size_is_recursive() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("album");
        fs::create_dir_all(sub.join("cd2")).unwrap();
        fs::write(sub.join("a.flac"), vec![0u8; 100]).unwrap();
        fs::write(sub.join("cd2").join("b.flac"), vec![0u8; 23]).unwrap();
        assert_eq!(size_on_disk(&sub).unwrap(), 123);
    }

    #[test]
    fn remove_tolerates_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        remove_backing_files(dir.path(), "nothing-here").unwrap();

        fs::write(dir.path().join("x.iso"), b"data").unwrap();
        fs::write(dir.path().join("x.iso.aria2"), b"ctl").unwrap();
        remove_backing_files(dir.path(), "x.iso").unwrap();
        assert!(!dir.path().join("x.iso").exists());
        assert!(!dir.path().join("x.iso.aria2").exists());

        fs::create_dir_all(dir.path().join("multi").join("inner")).unwrap();
        fs::write(dir.path().join("multi").join("inner").join("f"), b"1").unwrap();
        remove_backing_files(dir.path(), "multi").unwrap();
        assert!(!dir.path().join("multi").exists());
    }
}
