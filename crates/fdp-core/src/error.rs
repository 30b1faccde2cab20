//! Error taxonomy shared by the task state machines and the manager.
//!
//! Every failure of a task ends up recorded on the task itself (errored flag
//! plus message); these variants decide what that message says and how the
//! intake layer reports synchronous rejections.

use std::time::Duration;
use thiserror::Error;

use crate::rpc::RpcError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid locator: {0}")]
    InvalidLocator(String),
    #[error("locator expects http(s), magnet or torrent, not {0}")]
    UnsupportedScheme(String),
    #[error("content length {length} exceeds limit {limit}")]
    PayloadTooLarge { length: u64, limit: u64 },
    #[error("storage limit reached: {used} bytes in use, limit {limit}")]
    StorageFull { used: u64, limit: u64 },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("HTTP {0}")]
    HttpStatus(u32),
    #[error("task timeout after {0:?}")]
    Timeout(Duration),
    #[error("a task named {0} already exists")]
    NameCollision(String),
    #[error("downloader daemon is not running, cannot download magnet or torrent")]
    DownloaderUnavailable,
    #[error("task {0} not found")]
    NotFound(String),
    #[error("task {0} is still downloading")]
    StillDownloading(String),
    #[error("worker fault: {0}")]
    WorkerFault(String),
    #[error("task queue is closed")]
    QueueClosed,
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse class of an error, used for reporting and for the retry decision at the intake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Validation,
    Transport,
    Protocol,
    ResourceLimit,
    Timeout,
    Collision,
    Lookup,
    Storage,
    Internal,
}

impl Error {
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::InvalidLocator(_) | Error::UnsupportedScheme(_) => ErrorClass::Validation,
            Error::Transport(_) | Error::DownloaderUnavailable => ErrorClass::Transport,
            Error::Protocol(_) | Error::HttpStatus(_) => ErrorClass::Protocol,
            Error::PayloadTooLarge { .. } | Error::StorageFull { .. } => ErrorClass::ResourceLimit,
            Error::Timeout(_) => ErrorClass::Timeout,
            Error::NameCollision(_) => ErrorClass::Collision,
            Error::NotFound(_) | Error::StillDownloading(_) => ErrorClass::Lookup,
            Error::Io(_) => ErrorClass::Storage,
            Error::WorkerFault(_) | Error::QueueClosed => ErrorClass::Internal,
        }
    }
}

impl From<RpcError> for Error {
    fn from(e: RpcError) -> Self {
        match e {
            RpcError::Transport(msg) => Error::Transport(msg),
            other => Error::Protocol(other.to_string()),
        }
    }
}
