//! Direct HTTP(S) transfer: headers gate the output file, then the body streams in.

use std::cell::RefCell;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::PathBuf;
use std::str;
use std::time::{Duration, Instant};

use super::{human_size, lock, unix_now, ProgressSampler, SharedTask, TaskEnv};
use crate::error::{Error, Result};
use crate::locator::{parse_content_disposition_filename, safe_name};

const BUFFER_SIZE: usize = 4096;
const SAMPLE_EVERY: u64 = 1000;

/// What the final response's headers said.
#[derive(Debug, Default, PartialEq, Eq)]
struct Head {
    status: Option<u32>,
    content_length: Option<u64>,
    attachment: Option<String>,
}

fn parse_head(lines: &[String]) -> Head {
    let mut head = Head::default();
    for line in lines {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("HTTP/") {
            head.status = rest.split_whitespace().nth(1).and_then(|c| c.parse().ok());
            continue;
        }
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        if name.trim().eq_ignore_ascii_case("content-length") {
            head.content_length = value.parse().ok();
        } else if name.trim().eq_ignore_ascii_case("content-disposition") {
            head.attachment = parse_content_disposition_filename(value);
        }
    }
    head
}

/// One request's worth of options. The second pass never asks for a third.
struct Pass {
    retry_for_length: bool,
    /// Attachment name seen on the first pass.
    attachment: Option<String>,
}

enum Fetched {
    Done(u64),
    LengthUnknown(Option<String>),
}

enum Gate {
    Write(Sink),
    RetryForLength(Option<String>),
}

enum Stage {
    Headers,
    Writing(Sink),
    Retry(Option<String>),
    Failed(Error),
}

struct Sink {
    file: File,
    path: PathBuf,
    written: u64,
    limit: u64,
    sampler: ProgressSampler,
}

impl Sink {
    fn write(&mut self, data: &[u8], task: &SharedTask, started: Instant) -> Result<()> {
        self.file.write_all(data)?;
        self.written += data.len() as u64;
        // A server that never sent a length can still not exceed the cap.
        if self.written > self.limit {
            if let Err(e) = fs::remove_file(&self.path) {
                tracing::warn!(path = %self.path.display(), "could not remove oversized partial file: {}", e);
            }
            return Err(Error::PayloadTooLarge {
                length: self.written,
                limit: self.limit,
            });
        }
        if self.sampler.tick() {
            lock(task).record_progress(self.written, started.elapsed());
        }
        Ok(())
    }
}

pub(super) fn run(task: &SharedTask, env: &TaskEnv) -> Result<()> {
    let source = {
        let mut t = lock(task);
        t.info.start_time = unix_now();
        t.info.source.clone()
    };
    let started = Instant::now();

    let mut pass = Pass {
        retry_for_length: true,
        attachment: None,
    };
    let written = loop {
        match fetch(&source, task, env, started, &pass)? {
            Fetched::Done(written) => break written,
            Fetched::LengthUnknown(attachment) => {
                tracing::info!(source = %source, "no Content-Length on first response, requesting again");
                pass = Pass {
                    retry_for_length: false,
                    attachment,
                };
            }
        }
    };

    let mut t = lock(task);
    t.info.content_length = written;
    t.finish(written, started.elapsed());
    Ok(())
}

fn fetch(
    source: &str,
    task: &SharedTask,
    env: &TaskEnv,
    started: Instant,
    pass: &Pass,
) -> Result<Fetched> {
    let settings = &env.settings;
    let mut easy = curl::easy::Easy::new();
    easy.url(source)
        .map_err(|e| Error::InvalidLocator(format!("{}: {}", source, e)))?;
    easy.follow_location(true).map_err(transport)?;
    easy.max_redirections(10).map_err(transport)?;
    easy.connect_timeout(settings.connect_timeout).map_err(transport)?;
    easy.timeout(settings.task_timeout).map_err(transport)?;
    easy.buffer_size(BUFFER_SIZE).map_err(transport)?;
    easy.useragent(concat!("fdp/", env!("CARGO_PKG_VERSION")))
        .map_err(transport)?;

    let headers = RefCell::new(Vec::<String>::new());
    let mut stage = Stage::Headers;
    let performed = {
        let mut transfer = easy.transfer();
        transfer
            .header_function(|data| {
                if let Ok(line) = str::from_utf8(data) {
                    let line = line.trim_end();
                    let mut lines = headers.borrow_mut();
                    // Each redirect hop starts a fresh header block.
                    if line.starts_with("HTTP/") {
                        lines.clear();
                    }
                    if !line.is_empty() {
                        lines.push(line.to_string());
                    }
                }
                true
            })
            .map_err(transport)?;
        transfer
            .write_function(|data| {
                if matches!(stage, Stage::Headers) {
                    stage = match open_output(&headers.borrow(), task, env, pass) {
                        Ok(Gate::Write(sink)) => Stage::Writing(sink),
                        Ok(Gate::RetryForLength(a)) => Stage::Retry(a),
                        Err(e) => Stage::Failed(e),
                    };
                }
                let Stage::Writing(sink) = &mut stage else {
                    // Returning short aborts the transfer.
                    return Ok(0);
                };
                match sink.write(data, task, started) {
                    Ok(()) => Ok(data.len()),
                    Err(e) => {
                        stage = Stage::Failed(e);
                        Ok(0)
                    }
                }
            })
            .map_err(transport)?;
        transfer.perform()
    };

    match (stage, performed) {
        (Stage::Failed(e), _) => Err(e),
        (Stage::Retry(attachment), _) => Ok(Fetched::LengthUnknown(attachment)),
        (_, Err(e)) => Err(curl_failure(e, settings.task_timeout)),
        // Empty body: the gate never ran inside the transfer.
        (Stage::Headers, Ok(())) => match open_output(&headers.borrow(), task, env, pass)? {
            Gate::Write(sink) => finish_output(sink),
            Gate::RetryForLength(a) => Ok(Fetched::LengthUnknown(a)),
        },
        (Stage::Writing(sink), Ok(())) => finish_output(sink),
    }
}

fn finish_output(sink: Sink) -> Result<Fetched> {
    sink.file.sync_all()?;
    Ok(Fetched::Done(sink.written))
}

/// Runs once the final response's headers are in, before the first body byte.
fn open_output(lines: &[String], task: &SharedTask, env: &TaskEnv, pass: &Pass) -> Result<Gate> {
    let head = parse_head(lines);
    if let Some(code) = head.status.filter(|c| !(200..300).contains(c)) {
        return Err(Error::HttpStatus(code));
    }
    if head.content_length.is_none() && pass.retry_for_length {
        return Ok(Gate::RetryForLength(head.attachment));
    }

    if let Some(attachment) = head.attachment.or_else(|| pass.attachment.clone()) {
        adopt_attachment_name(task, env, &attachment)?;
    }

    let length = head.content_length.unwrap_or(0);
    let (name, source) = {
        let mut t = lock(task);
        t.info.content_length = length;
        (t.info.name.clone(), t.info.source.clone())
    };
    tracing::info!(
        task = %name,
        source = %source,
        length = %human_size(length),
        "direct transfer starting"
    );

    let limit = env.settings.limit_bytes;
    if length > limit {
        return Err(Error::PayloadTooLarge { length, limit });
    }

    let path = env.settings.download_dir.join(&name);
    match fs::remove_file(&path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(e.into()),
        _ => {}
    }
    let file = File::create(&path)?;
    Ok(Gate::Write(Sink {
        file,
        path,
        written: 0,
        limit,
        sampler: ProgressSampler::new(SAMPLE_EVERY),
    }))
}

/// Re-key under the server's attachment name; on collision keep the derived name.
fn adopt_attachment_name(task: &SharedTask, env: &TaskEnv, attachment: &str) -> Result<()> {
    let new_name = safe_name(attachment);
    match env.renamer.rename(task, &new_name) {
        Ok(()) => {
            tracing::debug!(task = %new_name, attachment, "renamed from Content-Disposition");
            Ok(())
        }
        Err(Error::NameCollision(taken)) => {
            tracing::warn!(name = %taken, "attachment name already taken, keeping derived name");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

fn transport(e: curl::Error) -> Error {
    Error::Transport(e.to_string())
}

fn curl_failure(e: curl::Error, timeout: Duration) -> Error {
    if e.is_operation_timedout() {
        Error::Timeout(timeout)
    } else {
        transport(e)
    }
}
