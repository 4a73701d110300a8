//! Mock bus for deterministic testing of the protocol stack.
//!
//! [`MockBus`] implements the [`Bus`] trait with a scripted queue of
//! per-exchange outcomes. Each `write()` consumes the next script entry,
//! which decides whether the write succeeds and what the following
//! `read()` produces: a canned reply, silence, or a fault. An exhausted
//! script is not an error; further writes succeed and further reads stay
//! silent, which is exactly how an absent device looks to the retry layer.
//!
//! The handle is cheap to clone and every clone shares state, so a test
//! can keep one handle for scripting and assertions while the engine owns
//! another boxed as its bus.
//!
//! # Example
//!
//! ```
//! use pmulib_test_harness::MockBus;
//!
//! let mock = MockBus::new();
//! // When the next request frame is written, answer with this reply.
//! mock.expect_reply(vec![
//!     0xDC, 0x0D, 0x02, 0x00, 0x04, 0x00, 0x00, 0x00, 0x57, 0x8B, 0x64,
//! ]);
//! ```

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use pmulib_core::{Bus, Error, Result};

/// One scripted exchange outcome.
#[derive(Debug, Clone)]
enum Outcome {
    /// Write succeeds; the next read returns these bytes.
    Reply(Vec<u8>),
    /// Write succeeds; the next read returns nothing.
    Silence,
    /// The write itself fails.
    WriteError,
    /// Write succeeds; the next read fails.
    ReadError,
}

#[derive(Debug)]
struct Inner {
    script: VecDeque<Outcome>,
    /// Outcome armed by the last write, consumed by the next read.
    pending: Option<Outcome>,
    writes: usize,
    reads: usize,
    frames: Vec<Vec<u8>>,
    connected: bool,
}

impl Inner {
    fn new() -> Self {
        Inner {
            script: VecDeque::new(),
            pending: None,
            writes: 0,
            reads: 0,
            frames: Vec::new(),
            connected: true,
        }
    }
}

/// A mock [`Bus`] for testing the protocol stack without hardware.
///
/// Outcomes are consumed in write order and can be appended at any point,
/// including between exchanges of a running test.
#[derive(Debug, Clone)]
pub struct MockBus {
    inner: Arc<Mutex<Inner>>,
}

impl MockBus {
    /// Create a new mock bus in the connected state with an empty script.
    pub fn new() -> Self {
        MockBus {
            inner: Arc::new(Mutex::new(Inner::new())),
        }
    }

    // A panicking test poisons the lock; the state is still fine to read.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Script a successful exchange: the next write succeeds and the read
    /// after it returns `reply`.
    pub fn expect_reply(&self, reply: Vec<u8>) {
        self.lock().script.push_back(Outcome::Reply(reply));
    }

    /// Script a silent exchange: the write succeeds, the read returns
    /// zero bytes.
    pub fn expect_silence(&self) {
        self.lock().script.push_back(Outcome::Silence);
    }

    /// Script a write fault: the next write itself returns an error.
    pub fn expect_write_error(&self) {
        self.lock().script.push_back(Outcome::WriteError);
    }

    /// Script a read fault: the write succeeds, the read after it returns
    /// an error.
    pub fn expect_read_error(&self) {
        self.lock().script.push_back(Outcome::ReadError);
    }

    /// Number of `write()` calls so far.
    pub fn write_calls(&self) -> usize {
        self.lock().writes
    }

    /// Number of `read()` calls so far.
    pub fn read_calls(&self) -> usize {
        self.lock().reads
    }

    /// Every frame written so far, in order, one element per `write()`.
    pub fn sent_frames(&self) -> Vec<Vec<u8>> {
        self.lock().frames.clone()
    }

    /// Number of scripted outcomes not yet consumed.
    pub fn remaining_expectations(&self) -> usize {
        self.lock().script.len()
    }

    /// Set the connected state.
    ///
    /// When `false`, subsequent `write()` and `read()` calls return
    /// [`Error::NotConnected`].
    pub fn set_connected(&self, connected: bool) {
        self.lock().connected = connected;
    }
}

impl Default for MockBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Bus for MockBus {
    async fn write(&mut self, data: &[u8]) -> Result<()> {
        let mut inner = self.lock();
        if !inner.connected {
            return Err(Error::NotConnected);
        }

        inner.writes += 1;
        inner.frames.push(data.to_vec());

        match inner.script.pop_front() {
            Some(Outcome::WriteError) => {
                inner.pending = None;
                Err(Error::Transport("scripted write failure".to_string()))
            }
            Some(outcome) => {
                inner.pending = Some(outcome);
                Ok(())
            }
            None => {
                inner.pending = None;
                Ok(())
            }
        }
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut inner = self.lock();
        if !inner.connected {
            return Err(Error::NotConnected);
        }

        inner.reads += 1;

        match inner.pending.take() {
            Some(Outcome::Reply(bytes)) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                Ok(n)
            }
            Some(Outcome::ReadError) => {
                Err(Error::Transport("scripted read failure".to_string()))
            }
            Some(Outcome::Silence) | Some(Outcome::WriteError) | None => Ok(0),
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.lock().connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.lock().connected
    }
}
