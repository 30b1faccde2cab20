//! Delegated transfer: submit to aria2c, then poll every job until done.

use base64::Engine as _;
use std::collections::{HashSet, VecDeque};
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::thread;
use std::time::Instant;

use super::{human_size, lock, unix_now, SharedTask, TaskEnv, TaskKind};
use crate::error::{Error, Result};
use crate::locator::{decode_torrent, MAGNET_PREFIX};
use crate::rpc::TellStatus;

pub(super) fn run(task: &SharedTask, env: &TaskEnv) -> Result<()> {
    if !env.daemon.is_running() {
        return Err(Error::DownloaderUnavailable);
    }
    let source = lock(task).info.source.clone();
    let gid = submit(task, env, &source)?;

    {
        let mut t = lock(task);
        t.info.start_time = unix_now();
        if let TaskKind::Delegated { gid: slot, .. } = &mut t.kind {
            *slot = Some(gid.clone());
        }
        tracing::info!(task = %t.info.name, source = %t.info.source, %gid, "delegated job submitted");
    }

    let started = Instant::now();
    let mut poll = Poll {
        task,
        env,
        started,
        deadline: started + env.settings.task_timeout,
        named: false,
        seen: HashSet::from([gid.clone()]),
        jobs: VecDeque::from([gid.clone()]),
    };
    let mut last = gid;
    while let Some(job) = poll.jobs.pop_front() {
        poll.until_done(&job)?;
        last = job;
    }

    if let Err(e) = env.daemon.rpc().remove_download_result(&last) {
        tracing::warn!(gid = %last, "removeDownloadResult failed: {}", e);
    }

    let mut t = lock(task);
    let size = t.info.size;
    t.finish(size, started.elapsed());
    tracing::debug!(task = %t.info.name, size = %human_size(size), "delegated jobs complete");
    Ok(())
}

/// Hands the locator to the daemon: magnet first, then base64 body, then file.
fn submit(task: &SharedTask, env: &TaskEnv, source: &str) -> Result<String> {
    let rpc = env.daemon.rpc();
    if source.starts_with(MAGNET_PREFIX) {
        return Ok(rpc.add_uri(source)?);
    }

    let (encoded, raw) = match decode_torrent(source) {
        Some(raw) => (source.trim().to_string(), raw),
        None => {
            let raw = fs::read(source)?;
            (base64::engine::general_purpose::STANDARD.encode(&raw), raw)
        }
    };
    let gid = rpc.add_torrent(&encoded)?;

    let path = torrent_path(&env.settings.download_dir, &encoded);
    match fs::write(&path, &raw) {
        Ok(()) => lock(task).info.source = path.to_string_lossy().into_owned(),
        Err(e) => tracing::warn!(path = %path.display(), "could not save torrent: {}", e),
    }
    Ok(gid)
}

/// `<dir>/<first 16 base64 chars>.torrent`; `/` is not allowed in a file name.
fn torrent_path(dir: &Path, encoded: &str) -> PathBuf {
    let stem: String = encoded
        .chars()
        .take(16)
        .map(|c| if c == '/' { '_' } else { c })
        .collect();
    dir.join(format!("{}.torrent", stem))
}

/// Top-level entry under the download dir that a reported file path belongs to.
fn real_name(reported: &str, dir: &Path) -> Option<String> {
    let path = Path::new(reported);
    let relative = match path.strip_prefix(dir) {
        Ok(rel) => rel.to_path_buf(),
        Err(_) => {
            let under_canonical = dir
                .canonicalize()
                .ok()
                .and_then(|c| path.strip_prefix(c).ok().map(Path::to_path_buf));
            match under_canonical {
                Some(rel) => rel,
                None => PathBuf::from(path.file_name()?),
            }
        }
    };
    relative.components().find_map(|c| match c {
        Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
        _ => None,
    })
}

struct Poll<'a> {
    task: &'a SharedTask,
    env: &'a TaskEnv,
    started: Instant,
    deadline: Instant,
    named: bool,
    seen: HashSet<String>,
    jobs: VecDeque<String>,
}

impl Poll<'_> {
    /// Polls one job until it completes, is force-completed, or hands over to follow-ups.
    fn until_done(&mut self, gid: &str) -> Result<()> {
        let interval = self.env.settings.poll_interval;
        let mut force_next = false;
        loop {
            let now = Instant::now();
            if now >= self.deadline {
                return Err(Error::Timeout(self.env.settings.task_timeout));
            }
            thread::sleep(interval.min(self.deadline - now));
            if Instant::now() >= self.deadline {
                return Err(Error::Timeout(self.env.settings.task_timeout));
            }

            let status = self.env.daemon.rpc().tell_status(gid)?;
            tracing::trace!(%gid, status = %status.status, done = status.completed_length, total = status.total_length, "aria2 status");
            if let Some(message) = status.failure() {
                return Err(Error::Protocol(format!("aria2 job {}: {}", gid, message)));
            }
            self.record(&status);
            if !self.named {
                self.adopt_real_name(&status)?;
            }

            if self.queue_follow_ups(&status) {
                tracing::debug!(%gid, follow_ups = ?status.followed_by, "job continues in follow-ups");
                return Ok(());
            }
            if status.is_complete() {
                return Ok(());
            }
            if force_next {
                tracing::info!(%gid, "all bytes in but job never reported complete, forcing completion");
                return Ok(());
            }
            // The daemon can sit in seeding/finalizing indefinitely; allow one more interval.
            force_next = status.total_length > 0 && status.completed_length == status.total_length;
        }
    }

    fn record(&self, status: &TellStatus) {
        let mut t = lock(self.task);
        t.info.content_length = status.total_length;
        t.record_progress(status.completed_length, self.started.elapsed());
    }

    fn adopt_real_name(&mut self, status: &TellStatus) -> Result<()> {
        let Some(name) = status
            .first_file_path()
            .and_then(|p| real_name(p, &self.env.settings.download_dir))
        else {
            return Ok(());
        };
        self.env.renamer.rename(self.task, &name)?;
        self.named = true;
        tracing::info!(task = %name, "delegated task renamed to its real name");
        Ok(())
    }

    fn queue_follow_ups(&mut self, status: &TellStatus) -> bool {
        let fresh: Vec<String> = status
            .followed_by
            .iter()
            .filter(|g| self.seen.insert(g.to_string()))
            .cloned()
            .collect();
        if fresh.is_empty() {
            return false;
        }
        if let TaskKind::Delegated { follow_ups, .. } = &mut lock(self.task).kind {
            follow_ups.extend(fresh.iter().cloned());
        }
        self.jobs.extend(fresh);
        true
    }
}
