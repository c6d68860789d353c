//! Test doubles for the bridge and its transport.

use std::{
    collections::{HashMap, VecDeque},
    io,
    pin::Pin,
    sync::{Arc, Mutex},
    task::{Context, Poll},
};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use crate::bridge::Bridge;

/// Handle on everything written into a [`FakeBuffer`].
#[derive(Clone, Default)]
pub struct Written(Arc<Mutex<Vec<u8>>>);

impl Written {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

/// Transport serving a fixed byte sequence and capturing writes.
pub struct FakeBuffer {
    read: Vec<u8>,
    pos: usize,
    written: Written,
}

impl FakeBuffer {
    pub fn new(read: Vec<u8>) -> Self {
        Self {
            read,
            pos: 0,
            written: Written::default(),
        }
    }

    pub fn written(&self) -> Written {
        self.written.clone()
    }
}

impl AsyncRead for FakeBuffer {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let remaining = &self.read[self.pos..];
        let n = remaining.len().min(buf.remaining());
        buf.put_slice(&remaining[..n]);
        self.pos += n;
        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for FakeBuffer {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.written.0.lock().unwrap().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[derive(Default)]
pub struct Recording {
    pub commands: Vec<String>,
    pub replies: HashMap<String, VecDeque<String>>,
    pub fail_connect: bool,
    pub fail_select: bool,
    pub fail_on: Option<String>,
    pub selected: Option<u8>,
    pub closes: usize,
}

/// Bridge recording every command it is handed.
///
/// Queries are answered from scripted replies, an unscripted query times out
/// like a silent instrument.
#[derive(Clone, Default)]
pub struct RecordingBridge(Arc<Mutex<Recording>>);

impl RecordingBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, command: &str, reply: &str) -> Self {
        self.0
            .lock()
            .unwrap()
            .replies
            .entry(command.to_string())
            .or_default()
            .push_back(reply.to_string());
        self
    }

    pub fn failing_connect(self) -> Self {
        self.0.lock().unwrap().fail_connect = true;
        self
    }

    pub fn failing_select(self) -> Self {
        self.0.lock().unwrap().fail_select = true;
        self
    }

    /// Make the transport break on the first command starting with `prefix`.
    pub fn failing_on(self, prefix: &str) -> Self {
        self.0.lock().unwrap().fail_on = Some(prefix.to_string());
        self
    }

    pub fn commands(&self) -> Vec<String> {
        self.0.lock().unwrap().commands.clone()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().commands.clear();
    }

    pub fn selected(&self) -> Option<u8> {
        self.0.lock().unwrap().selected
    }

    pub fn closes(&self) -> usize {
        self.0.lock().unwrap().closes
    }

    fn record(&self, command: &str) -> io::Result<()> {
        let mut rec = self.0.lock().unwrap();
        if let Some(prefix) = &rec.fail_on {
            if command.starts_with(prefix.as_str()) {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "Fake link down"));
            }
        }
        rec.commands.push(command.to_string());
        Ok(())
    }
}

#[async_trait]
impl Bridge for RecordingBridge {
    async fn connect(&mut self) -> io::Result<()> {
        if self.0.lock().unwrap().fail_connect {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "Fake bridge unreachable",
            ));
        }
        Ok(())
    }

    async fn select(&mut self, address: u8) -> io::Result<()> {
        let mut rec = self.0.lock().unwrap();
        if rec.fail_select {
            return Err(io::Error::new(io::ErrorKind::NotFound, "Fake device absent"));
        }
        rec.selected = Some(address);
        Ok(())
    }

    async fn write(&mut self, command: &str) -> io::Result<()> {
        self.record(command)
    }

    async fn query(&mut self, command: &str) -> io::Result<String> {
        self.record(command)?;
        self.0
            .lock()
            .unwrap()
            .replies
            .get_mut(command)
            .and_then(VecDeque::pop_front)
            .ok_or_else(|| io::Error::new(io::ErrorKind::TimedOut, "Fake query unanswered"))
    }

    async fn close(&mut self) -> io::Result<()> {
        self.0.lock().unwrap().closes += 1;
        Ok(())
    }
}
