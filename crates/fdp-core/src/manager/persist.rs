//! Registry snapshot on disk: a JSON array of tasks, replaced atomically.

use anyhow::{Context, Result};
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use super::disk::remove_backing_files;
use super::TaskManager;
use crate::task::{lock, Task};

/// Writes `tasks` to `<path>.tmp`, syncs it, then renames over `path`.
pub fn write_snapshot(path: &Path, tasks: &[Task]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("create dir: {}", parent.display()))?;
    }
    let json = serde_json::to_vec_pretty(tasks).context("serialize tasks")?;
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = Path::new(&tmp_name);

    let mut file = fs::File::create(tmp).with_context(|| format!("create {}", tmp.display()))?;
    file.write_all(&json)
        .with_context(|| format!("write {}", tmp.display()))?;
    file.sync_all()
        .with_context(|| format!("sync {}", tmp.display()))?;
    drop(file);
    fs::rename(tmp, path)
        .with_context(|| format!("replace snapshot {}", path.display()))?;
    Ok(())
}

/// Reads a snapshot. A missing file is an empty registry.
pub fn read_snapshot(path: &Path) -> Result<Vec<Task>> {
    let bytes = match fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e).with_context(|| format!("read snapshot: {}", path.display())),
    };
    serde_json::from_slice(&bytes).with_context(|| format!("parse snapshot: {}", path.display()))
}

impl TaskManager {
    /// Serializes the whole registry over the previous snapshot.
    pub fn persist(&self) -> Result<()> {
        let tasks = self.inner.registry.snapshot();
        write_snapshot(&self.inner.snapshot_path, &tasks)?;
        tracing::info!(
            path = %self.inner.snapshot_path.display(),
            tasks = tasks.len(),
            "registry persisted"
        );
        Ok(())
    }

    /// Registers the tasks from the snapshot whose files still exist. Returns how many.
    pub fn load(&self) -> Result<usize> {
        let tasks = read_snapshot(&self.inner.snapshot_path)?;
        let dir = &self.inner.settings.download_dir;
        let mut loaded = 0;
        for task in tasks {
            let name = task.info.name.clone();
            if name.is_empty() || !dir.join(&name).exists() {
                tracing::debug!(task = %name, "file gone, dropping from snapshot");
                continue;
            }
            match self.inner.registry.insert(task.into_shared()) {
                Ok(()) => loaded += 1,
                Err(e) => tracing::warn!(task = %name, "skipping snapshot entry: {}", e),
            }
        }
        if loaded > 0 {
            self.inner.signal.notify();
        }
        Ok(loaded)
    }

    /// Restarts every unfinished task from scratch. Returns how many were queued.
    pub async fn resume_unfinished(&self) -> crate::Result<usize> {
        let dir = self.inner.settings.download_dir.clone();
        let mut resumed = 0;
        for task in self.inner.registry.handles() {
            {
                let mut t = lock(&task);
                if t.is_completed() {
                    continue;
                }
                remove_backing_files(&dir, &t.info.name)?;
                t.reset();
                tracing::info!(task = %t.info.name, "restarting unfinished task");
            }
            self.submit(task).await?;
            resumed += 1;
        }
        Ok(resumed)
    }

    /// `load` followed by `resume_unfinished`.
    pub async fn restore(&self) -> Result<usize> {
        let loaded = self.load()?;
        let resumed = self.resume_unfinished().await?;
        tracing::info!(loaded, resumed, "registry restored");
        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskKind;
    use std::time::Duration;

    #[test]
    fn snapshot_roundtrip_and_no_tmp_left() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("tasks.json");
        let mut done = Task::new("a-1", "http://example.com/a", TaskKind::Direct);
        done.info.content_length = 10;
        done.finish(10, Duration::from_millis(1500));
        let mut magnet = Task::new(
            "ubuntu",
            "magnet:?xt=urn:btih:abc",
            TaskKind::Delegated {
                gid: Some("g1".into()),
                follow_ups: vec!["g2".into()],
            },
        );
        magnet.fail(&crate::Error::DownloaderUnavailable);

        write_snapshot(&path, &[done.clone(), magnet.clone()]).unwrap();
        assert!(!dir.path().join("state").join("tasks.json.tmp").exists());
        let back = read_snapshot(&path).unwrap();
        assert_eq!(back, vec![done, magnet]);
    }

    #[test]
    fn missing_snapshot_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_snapshot(&dir.path().join("none.json")).unwrap().is_empty());
    }

    #[test]
    fn corrupt_snapshot_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.json");
        fs::write(&path, b"{not json").unwrap();
        assert!(read_snapshot(&path).is_err());
    }
}
