//! Compile request queue between the tracer and the worker

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;

/// A target to compile, with the memory image to compile it from.
pub(crate) struct CompileRequest {
    pub target: u16,
    pub image: Arc<[u8]>,
}

struct State {
    pending: VecDeque<CompileRequest>,
    busy: bool,
    closed: bool,
}

/// Unbounded single-consumer queue.
///
/// The consumer blocks in [`next`](Self::next) until a request arrives or
/// the queue is closed. Closing drops whatever is still pending.
pub(crate) struct CompileQueue {
    state: Mutex<State>,
    work: Condvar,
    idle: Condvar,
}

impl CompileQueue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                pending: VecDeque::new(),
                busy: false,
                closed: false,
            }),
            work: Condvar::new(),
            idle: Condvar::new(),
        }
    }

    /// Enqueue a request. Returns false once the queue is closed.
    pub fn push(&self, request: CompileRequest) -> bool {
        let mut state = self.state.lock();
        if state.closed {
            return false;
        }
        state.pending.push_back(request);
        drop(state);
        self.work.notify_one();
        true
    }

    /// Next request for the consumer, or `None` once closed.
    ///
    /// Calling this also marks the previous request as finished.
    pub fn next(&self) -> Option<CompileRequest> {
        let mut state = self.state.lock();
        state.busy = false;
        loop {
            if state.closed {
                self.idle.notify_all();
                return None;
            }
            if let Some(request) = state.pending.pop_front() {
                state.busy = true;
                return Some(request);
            }
            self.idle.notify_all();
            self.work.wait(&mut state);
        }
    }

    /// Block until nothing is pending or in progress, or the queue closes.
    pub fn wait_idle(&self) {
        let mut state = self.state.lock();
        while !state.closed && (state.busy || !state.pending.is_empty()) {
            self.idle.wait(&mut state);
        }
    }

    /// Drop every pending request without closing. A request already
    /// handed to the consumer is not affected.
    pub fn clear(&self) -> usize {
        let mut state = self.state.lock();
        let dropped = state.pending.len();
        state.pending.clear();
        drop(state);
        self.idle.notify_all();
        dropped
    }

    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        state.pending.clear();
        drop(state);
        self.work.notify_all();
        self.idle.notify_all();
    }

    pub fn len(&self) -> usize {
        self.state.lock().pending.len()
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
