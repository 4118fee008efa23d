use std::collections::VecDeque;

use parking_lot::Mutex;
use shardworld_kernel::{Connection, MoveRequest};

use crate::moves::{InputError, format_moves, parse_moves};

/// Messages kept for a reader that falls behind; older ones are dropped.
pub const DEFAULT_OUTBOX: usize = 64;

#[derive(Debug, Default)]
struct Inner {
    inbound: Vec<MoveRequest>,
    outbox: VecDeque<Vec<u8>>,
    dropped: usize,
    closed: bool,
}

/// An in-process [`Connection`]: the host pushes move batches in and drains
/// rendered viewports out.
#[derive(Debug)]
pub struct QueuedConnection {
    inner: Mutex<Inner>,
    outbox_capacity: usize,
}

impl QueuedConnection {
    pub fn new() -> Self {
        Self::with_outbox(DEFAULT_OUTBOX)
    }

    pub fn with_outbox(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            outbox_capacity: capacity.max(1),
        }
    }

    /// Validate and queue a batch of moves. Nothing is queued on error.
    pub fn push_moves(&self, moves: &str, timestamp: u64) -> Result<usize, InputError> {
        let parsed = parse_moves(moves)?;
        let count = parsed.len();
        if count > 0 {
            self.inner.lock().inbound.push(MoveRequest {
                moves: format_moves(&parsed),
                timestamp,
            });
        }
        Ok(count)
    }

    /// Take every message sent since the last drain, oldest first.
    pub fn drain(&self) -> Vec<Vec<u8>> {
        self.inner.lock().outbox.drain(..).collect()
    }

    /// Most recent message, leaving the outbox untouched.
    pub fn latest(&self) -> Option<Vec<u8>> {
        self.inner.lock().outbox.back().cloned()
    }

    /// Messages discarded because the outbox was full.
    pub fn dropped(&self) -> usize {
        self.inner.lock().dropped
    }

    pub fn close(&self) {
        self.inner.lock().closed = true;
    }
}

impl Default for QueuedConnection {
    fn default() -> Self {
        Self::new()
    }
}

impl Connection for QueuedConnection {
    fn take_moves(&self) -> Vec<MoveRequest> {
        std::mem::take(&mut self.inner.lock().inbound)
    }

    fn send(&self, message: Vec<u8>) {
        let mut inner = self.inner.lock();
        if inner.outbox.len() >= self.outbox_capacity {
            inner.outbox.pop_front();
            inner.dropped += 1;
            tracing::trace!(dropped = inner.dropped, "outbox full, dropping oldest message");
        }
        inner.outbox.push_back(message);
    }

    fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }
}
