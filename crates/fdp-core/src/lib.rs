pub mod config;
pub mod error;
pub mod logging;

pub mod broadcast;
pub mod locator;
pub mod manager;
pub mod retry;
pub mod rpc;
pub mod task;

pub use error::{Error, ErrorClass, Result};
