//! Shared utilities for integration tests.

#![allow(dead_code)]

use axum::http::{Method, Request};
use bytes::Bytes;
use http_dispatch::Exchange;
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use tracing_subscriber::fmt::MakeWriter;

/// Log sink collecting formatted events in memory.
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    pub fn contents(&self) -> String {
        let buf = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&buf).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Run `f` with a subscriber writing into memory; returns its result and the log text.
pub fn capture_logs<R>(f: impl FnOnce() -> R) -> (R, String) {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();
    let result = tracing::subscriber::with_default(subscriber, f);
    (result, logs.contents())
}

/// Lines logged at error level.
pub fn error_lines(logs: &str) -> Vec<&str> {
    logs.lines().filter(|line| line.contains(" ERROR ")).collect()
}

/// A bodiless request from `peer`.
pub fn request(method: Method, uri: &str, peer: &str) -> Exchange {
    let addr: SocketAddr = peer.parse().unwrap();
    Exchange::new(
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Bytes::new())
            .unwrap(),
    )
    .with_remote_addr(addr)
}

pub fn get(uri: &str) -> Exchange {
    request(Method::GET, uri, "203.0.113.10:40000")
}
