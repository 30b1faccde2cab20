//! Minimal HTTP/1.1 file server for direct-transfer tests.
//!
//! Serves one static body on any path. Can leave out `Content-Length` (the body
//! is then delimited by closing the connection), attach a
//! `Content-Disposition`, or answer with an error status.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct FileServerOptions {
    /// Leave out `Content-Length` on this many initial requests.
    pub unsized_responses: usize,
    /// `Content-Disposition` value to send.
    pub disposition: Option<String>,
    /// Status line to send instead of `200 OK`.
    pub status: Option<&'static str>,
}

pub struct FileServer {
    /// Base URL, e.g. `http://127.0.0.1:12345/`.
    pub url: String,
    hits: Arc<AtomicUsize>,
}

impl FileServer {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

pub fn start(body: Vec<u8>) -> FileServer {
    start_with_options(body, FileServerOptions::default())
}

pub fn start_with_options(body: Vec<u8>, opts: FileServerOptions) -> FileServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let body = Arc::new(body);
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            let body = Arc::clone(&body);
            let opts = opts.clone();
            thread::spawn(move || handle(stream, &body, &opts, n));
        }
    });
    FileServer {
        url: format!("http://127.0.0.1:{}/", port),
        hits,
    }
}

fn handle(mut stream: TcpStream, body: &[u8], opts: &FileServerOptions, request_no: usize) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(5)));
    let mut buf = [0u8; 8192];
    match stream.read(&mut buf) {
        Ok(0) | Err(_) => return,
        Ok(_) => {}
    }

    let mut head = format!("HTTP/1.1 {}\r\n", opts.status.unwrap_or("200 OK"));
    if request_no >= opts.unsized_responses {
        head.push_str(&format!("Content-Length: {}\r\n", body.len()));
    }
    if let Some(disposition) = &opts.disposition {
        head.push_str(&format!("Content-Disposition: {}\r\n", disposition));
    }
    head.push_str("Connection: close\r\n\r\n");
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(body);
    let _ = stream.flush();
}
